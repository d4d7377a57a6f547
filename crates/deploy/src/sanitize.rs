//! Scrubbing and classification of error text before it reaches a user.

/// Maximum length of a fallback error message.
const MAX_MESSAGE_CHARS: usize = 120;

/// Coarse category of an on-chain failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ChainErrorKind {
    UserRejected,
    InsufficientFunds,
    Timeout,
    Gas,
    Reverted,
    Other,
}

/// Classify provider or receipt error text by pattern.
pub fn classify_chain_error(text: &str) -> ChainErrorKind {
    let lower = text.to_lowercase();

    if lower.contains("user rejected") || lower.contains("user denied") {
        ChainErrorKind::UserRejected
    } else if lower.contains("insufficient funds") {
        ChainErrorKind::InsufficientFunds
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ChainErrorKind::Timeout
    } else if lower.contains("gas") {
        ChainErrorKind::Gas
    } else if lower.contains("revert") {
        ChainErrorKind::Reverted
    } else {
        ChainErrorKind::Other
    }
}

/// Short user-facing text for a classified failure.
///
/// Unclassified failures fall back to the first sentence of the sanitized text.
pub fn user_message(kind: ChainErrorKind, text: &str) -> String {
    match kind {
        ChainErrorKind::UserRejected => "Transaction was rejected in the wallet".to_string(),
        ChainErrorKind::InsufficientFunds => {
            "Insufficient funds to pay for the transaction".to_string()
        }
        ChainErrorKind::Timeout => "Timed out waiting for the transaction to confirm".to_string(),
        ChainErrorKind::Gas => "Gas estimation failed, the transaction would likely fail".to_string(),
        ChainErrorKind::Reverted => "Transaction reverted on-chain".to_string(),
        ChainErrorKind::Other => first_sentence(&sanitize_message(text)),
    }
}

/// Remove addresses, transaction hashes, file paths and line numbers.
pub fn sanitize_message(text: &str) -> String {
    let scrubbed = scrub_hex(text);
    let words: Vec<&str> = scrubbed.split_whitespace().collect();

    let mut out: Vec<String> = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let word = words[i];
        let lead = word.len() - word.trim_start_matches(['(', '[']).len();
        let next = words.get(i + 1).filter(|next| starts_with_digit(next));
        if let (true, Some(next)) = (word[lead..].eq_ignore_ascii_case("line"), next) {
            let tail = next.trim_start_matches(|c: char| c.is_ascii_digit());
            out.push(format!("{}[line]{}", &word[..lead], tail));
            i += 2;
            continue;
        }
        out.push(scrub_path(word));
        i += 1;
    }

    out.join(" ")
}

/// Replace `0x` hex runs of address or hash length.
fn scrub_hex(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        let at_prefix = bytes[i] == b'0'
            && bytes.get(i + 1).is_some_and(|b| *b == b'x' || *b == b'X')
            && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric());
        if at_prefix {
            let digits = bytes[i + 2..]
                .iter()
                .take_while(|b| b.is_ascii_hexdigit())
                .count();
            let replacement = match digits {
                40 => Some("[address]"),
                64 => Some("[hash]"),
                _ => None,
            };
            if let Some(replacement) = replacement {
                out.push_str(replacement);
                i += 2 + digits;
                continue;
            }
        }
        // Hex runs only start on ASCII, so copying whole chars is safe here.
        let ch = text[i..].chars().next().unwrap_or_default();
        out.push(ch);
        i += ch.len_utf8().max(1);
    }

    out
}

/// Replace a path-like word, keeping surrounding punctuation.
fn scrub_path(word: &str) -> String {
    let core = word.trim_matches(|c: char| matches!(c, '(' | ')' | '"' | '\'' | ',' | ';'));
    if core.is_empty() || !looks_like_path(core) {
        return word.to_string();
    }
    word.replacen(core, "[path]", 1)
}

fn looks_like_path(word: &str) -> bool {
    if word.contains("://") {
        return false;
    }
    let rooted = word.starts_with('/')
        || word.starts_with("./")
        || word.starts_with("../")
        || word.starts_with("~/")
        || word.contains('\\');
    let drive = word.len() > 2 && word.as_bytes()[1] == b':' && word.as_bytes()[2] == b'\\';
    rooted || drive || has_line_suffix(word)
}

/// `file.ts:12` or `file.ts:12:5`.
fn has_line_suffix(word: &str) -> bool {
    let mut parts = word.split(':');
    let Some(file) = parts.next() else {
        return false;
    };
    let rest: Vec<&str> = parts.collect();
    file.contains('.')
        && !rest.is_empty()
        && rest.len() <= 2
        && rest
            .iter()
            .all(|p| !p.is_empty() && p.trim_end_matches(['.', ',', ')']).chars().all(|c| c.is_ascii_digit()))
}

fn starts_with_digit(word: &str) -> bool {
    word.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// First sentence of `text`, truncated.
fn first_sentence(text: &str) -> String {
    let sentence = text
        .find(". ")
        .map(|end| &text[..end + 1])
        .unwrap_or(text)
        .trim();

    if sentence.chars().count() <= MAX_MESSAGE_CHARS {
        return sentence.to_string();
    }
    let truncated: String = sentence.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    format!("{}...", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_patterns() {
        assert_eq!(
            classify_chain_error("MetaMask Tx Signature: User rejected the request"),
            ChainErrorKind::UserRejected
        );
        assert_eq!(
            classify_chain_error("insufficient funds for gas * price + value"),
            ChainErrorKind::InsufficientFunds
        );
        assert_eq!(
            classify_chain_error("gas required exceeds allowance (30000000)"),
            ChainErrorKind::Gas
        );
        assert_eq!(
            classify_chain_error("Deployment transaction was reverted"),
            ChainErrorKind::Reverted
        );
        assert_eq!(
            classify_chain_error("Timed out after 60s waiting for receipt"),
            ChainErrorKind::Timeout
        );
        assert_eq!(classify_chain_error("connection refused"), ChainErrorKind::Other);
    }

    #[test]
    fn test_sanitize_addresses_and_hashes() {
        let text = format!(
            "call to 0x{} failed in tx 0x{}",
            "ab".repeat(20),
            "cd".repeat(32)
        );
        assert_eq!(
            sanitize_message(&text),
            "call to [address] failed in tx [hash]"
        );
    }

    #[test]
    fn test_sanitize_keeps_short_hex() {
        assert_eq!(sanitize_message("status 0x1"), "status 0x1");
    }

    #[test]
    fn test_sanitize_paths_and_lines() {
        assert_eq!(
            sanitize_message("error at /home/user/app/src/deploy.ts:12:5 (line 12)"),
            "error at [path] ([line])"
        );
        assert_eq!(
            sanitize_message("panicked at deploy.rs:88, see C:\\logs\\x.txt"),
            "panicked at [path], see [path]"
        );
        assert_eq!(
            sanitize_message("fetch https://api.example/x failed"),
            "fetch https://api.example/x failed"
        );
    }

    #[test]
    fn test_user_message_falls_back_to_first_sentence() {
        let text = "Provider exploded. Here is a huge dump of internals";
        assert_eq!(user_message(ChainErrorKind::Other, text), "Provider exploded.");

        let long = "x".repeat(500);
        assert_eq!(user_message(ChainErrorKind::Other, &long).chars().count(), 120);
    }

    #[test]
    fn test_user_message_categories_hide_details() {
        let text = format!("execution reverted at 0x{}", "ab".repeat(20));
        assert_eq!(
            user_message(classify_chain_error(&text), &text),
            "Transaction reverted on-chain"
        );
    }
}
