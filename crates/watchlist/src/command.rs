//! Watchlist Commands
//!
//! One command per line, space separated:
//!
//! - `add <name> <code> [<name> <code> ...]`
//! - `remove <name|code>`
//! - `clear`
//! - `hold <name|code>` / `unhold <name|code>`
//! - `alert <name|code> <price>` / `unalert <name|code>`

use std::str::FromStr;
use watch_core::WatchError;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// (name, symbol) pairs
    Add(Vec<(String, String)>),
    Remove(String),
    Clear,
    Hold { key: String, held: bool },
    Alert { key: String, price: f64 },
    Unalert(String),
    /// Print the watchlist, held entries first
    List,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, WatchError> {
        let keys: Vec<&str> = line.split_whitespace().collect();
        let (verb, args) = match keys.split_first() {
            Some((verb, args)) => (verb.to_ascii_lowercase(), args),
            None => return Err(WatchError::Command("empty command".to_string())),
        };

        match verb.as_str() {
            "add" => {
                // A trailing name without a code is ignored
                let pairs: Vec<(String, String)> = args
                    .chunks_exact(2)
                    .map(|pair| (pair[0].to_string(), normalize_symbol(pair[1])))
                    .collect();
                if pairs.is_empty() {
                    return Err(WatchError::Command(
                        "usage: add <name> <code> [<name> <code> ...]".to_string(),
                    ));
                }
                Ok(Command::Add(pairs))
            }
            "remove" => single_key(args, "remove").map(Command::Remove),
            "clear" => Ok(Command::Clear),
            "list" | "ls" => Ok(Command::List),
            "hold" => single_key(args, "hold").map(|key| Command::Hold { key, held: true }),
            "unhold" => single_key(args, "unhold").map(|key| Command::Hold { key, held: false }),
            "alert" => match args {
                [key, price] => {
                    let price: f64 = price
                        .parse()
                        .map_err(|_| WatchError::Command(format!("invalid alert price: {}", price)))?;
                    if !price.is_finite() || price <= 0.0 {
                        return Err(WatchError::Command(format!("alert price must be positive: {}", price)));
                    }
                    Ok(Command::Alert {
                        key: key.to_string(),
                        price,
                    })
                }
                _ => Err(WatchError::Command("usage: alert <name|code> <price>".to_string())),
            },
            "unalert" => single_key(args, "unalert").map(Command::Unalert),
            other => Err(WatchError::Command(format!("unknown command: {}", other))),
        }
    }
}

impl FromStr for Command {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}

fn single_key(args: &[&str], verb: &str) -> Result<String, WatchError> {
    match args.first() {
        Some(key) => Ok(key.to_string()),
        None => Err(WatchError::Command(format!("usage: {} <name|code>", verb))),
    }
}

/// Quote symbols are upper-case exchange-prefixed codes, e.g. `SH600000`
pub fn normalize_symbol(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_add() {
        let cmd: Command = "add PFBank sh600000 PingAn SZ000001".parse().unwrap();
        assert_eq!(
            cmd,
            Command::Add(vec![
                ("PFBank".to_string(), "SH600000".to_string()),
                ("PingAn".to_string(), "SZ000001".to_string()),
            ])
        );
    }

    #[test]
    fn test_add_ignores_dangling_name() {
        let cmd = Command::parse("add PFBank SH600000 Orphan").unwrap();
        assert_eq!(cmd, Command::Add(vec![("PFBank".to_string(), "SH600000".to_string())]));
        assert!(Command::parse("add Orphan").is_err());
    }

    #[test]
    fn test_parse_alert() {
        assert_eq!(
            Command::parse("alert SH600000 50.5").unwrap(),
            Command::Alert {
                key: "SH600000".to_string(),
                price: 50.5
            }
        );
        assert!(Command::parse("alert SH600000 abc").is_err());
        assert!(Command::parse("alert SH600000 -3").is_err());
        assert!(Command::parse("alert SH600000").is_err());
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(Command::parse("  clear ").unwrap(), Command::Clear);
        assert_eq!(Command::parse("LIST").unwrap(), Command::List);
        assert_eq!(Command::parse("remove PFBank").unwrap(), Command::Remove("PFBank".to_string()));
        assert_eq!(
            Command::parse("unhold PFBank").unwrap(),
            Command::Hold {
                key: "PFBank".to_string(),
                held: false
            }
        );
        assert!(Command::parse("").is_err());
        assert!(Command::parse("buy SH600000").is_err());
        assert!(Command::parse("remove").is_err());
    }
}
