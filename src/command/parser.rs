//! Tokenizer for normalized chat text.

use super::{Command, CommandError, DEFAULT_TIP_AMOUNT};
use crate::domain::LedgerAddress;

/// Parse normalized chat text.
///
/// Returns `Ok(None)` when the leading word is not a command keyword, so
/// ordinary conversation never yields an error.
pub fn parse(text: &str) -> Result<Option<Command>, CommandError> {
    let mut tokens = text.split_whitespace();
    let keyword = match tokens.next() {
        Some(word) => word.to_ascii_lowercase(),
        None => return Ok(None),
    };
    let args: Vec<&str> = tokens.collect();

    let command = match keyword.as_str() {
        "help" => Command::Help,
        "deposit" => Command::Deposit,
        "balance" => Command::Balance,
        "send" | "tip" | "!tip" => parse_transfer(&args)?,
        "withdraw" => parse_withdraw(&args)?,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn parse_transfer(args: &[&str]) -> Result<Command, CommandError> {
    let mut target = None;
    let mut amount = None;

    for token in args {
        if target.is_none() {
            if let Some(handle) = mention_handle(token) {
                target = Some(handle);
                continue;
            }
        }
        if amount.is_none() && looks_numeric(token) {
            let value = token.parse::<i64>().map_err(|_| {
                CommandError::parse("send", format!("can't send {} XEM, not a number", token))
            })?;
            amount = Some(value);
        }
    }

    let target_handle =
        target.ok_or_else(|| CommandError::parse("send", "couldn't find username"))?;
    let amount = amount.unwrap_or(DEFAULT_TIP_AMOUNT);
    if amount <= 0 {
        return Err(CommandError::parse(
            "send",
            format!("can't send {} XEM", amount),
        ));
    }

    Ok(Command::Transfer {
        target_handle,
        amount,
    })
}

fn parse_withdraw(args: &[&str]) -> Result<Command, CommandError> {
    let raw_address = args
        .first()
        .ok_or_else(|| CommandError::parse("withdraw", "missing target address"))?;
    let address = LedgerAddress::parse(raw_address)?;

    let amount = match args.get(1) {
        None => None,
        Some(raw) => {
            let value = raw.parse::<i64>().map_err(|_| {
                CommandError::parse("withdraw", format!("can't send: {}, not a number", raw))
            })?;
            if value <= 0 {
                return Err(CommandError::parse(
                    "withdraw",
                    format!("can't send {} XEM", value),
                ));
            }
            Some(value)
        }
    };

    Ok(Command::Withdraw { address, amount })
}

/// Whether a token was meant as an amount: `12`, `-3`, `0.5`, `1,5`, `.5`.
fn looks_numeric(token: &str) -> bool {
    let unsigned = token.strip_prefix(['-', '+']).unwrap_or(token);
    let unsigned = unsigned.strip_prefix(['.', ',']).unwrap_or(unsigned);
    unsigned.starts_with(|c: char| c.is_ascii_digit())
}

/// Extract the handle from `@handle`, `<@ID>` or `<@ID|handle>`.
fn mention_handle(token: &str) -> Option<String> {
    let token = token.trim_end_matches([':', ',', '.', '!']);

    let handle = if let Some(inner) = token.strip_prefix("<@").and_then(|t| t.strip_suffix('>')) {
        match inner.split_once('|') {
            Some((_, readable)) if !readable.is_empty() => readable,
            _ => inner,
        }
    } else {
        token.strip_prefix('@')?
    };

    if handle.is_empty() {
        None
    } else {
        Some(handle.to_string())
    }
}
