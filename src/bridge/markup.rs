//! Conversion of primary-network markup into plain text.

use super::UserDirectory;

const BROADCASTS: [&str; 3] = ["channel", "group", "everyone"];

/// Rewrite `<...>` markup into the plain form commands and relays expect.
///
/// User references without a label are resolved through `directory`.
/// Entities are decoded last, so escaped brackets never become markup.
pub async fn normalize<D>(text: &str, directory: &D) -> String
where
    D: UserDirectory + ?Sized,
{
    let flat = text.replace("\r\n", " ").replace(['\n', '\r'], " ");
    let mut out = String::with_capacity(flat.len());
    let mut rest = flat.as_str();

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('>') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let inner = &after[..end];
        match rewrite(inner, directory).await {
            Some(replacement) => out.push_str(&replacement),
            None => {
                out.push('<');
                out.push_str(inner);
                out.push('>');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

async fn rewrite<D>(inner: &str, directory: &D) -> Option<String>
where
    D: UserDirectory + ?Sized,
{
    if inner.is_empty() || inner.chars().any(char::is_whitespace) {
        return None;
    }

    let (target, label) = match inner.split_once('|') {
        Some((target, label)) if !label.is_empty() => (target, Some(label)),
        Some((target, _)) => (target, None),
        None => (inner, None),
    };

    if let Some(id) = target.strip_prefix('@') {
        return Some(match label {
            Some(label) => format!("@{}", label),
            None => match directory.find_by_id(id).await {
                Some(user) => format!("@{}", user.handle),
                None => format!("@{}", id),
            },
        });
    }

    if let Some(id) = target.strip_prefix('#') {
        return Some(match label {
            Some(label) => label.to_string(),
            None => format!("#{}", id),
        });
    }

    if let Some(command) = target.strip_prefix('!') {
        if label.is_none() && BROADCASTS.contains(&command) {
            return Some(format!("@{}", command));
        }
        return Some(format!("<{}>", label.unwrap_or(command)));
    }

    Some(target.to_string())
}
