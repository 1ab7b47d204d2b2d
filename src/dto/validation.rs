//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest accepted post, in characters.
pub const MAX_POST_CHARS: usize = 140;
/// Longest accepted wallet address.
pub const MAX_WALLET_CHARS: usize = 128;

/// Validates that post content is non-blank and at most [`MAX_POST_CHARS`] characters.
pub fn validate_post_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        let mut err = ValidationError::new("content_blank");
        err.message = Some("Post content must not be empty".into());
        return Err(err);
    }

    let chars = content.chars().count();
    if chars > MAX_POST_CHARS {
        let mut err = ValidationError::new("content_length");
        err.message = Some(
            format!("Post content must be at most {MAX_POST_CHARS} characters (got {chars})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a wallet address is present, bounded and free of whitespace.
pub fn validate_wallet_address(wallet: &str) -> Result<(), ValidationError> {
    if wallet.is_empty() || wallet.len() > MAX_WALLET_CHARS {
        let mut err = ValidationError::new("wallet_length");
        err.message = Some(
            format!("Wallet address must be 1 to {MAX_WALLET_CHARS} characters").into(),
        );
        return Err(err);
    }

    if wallet.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("wallet_format");
        err.message = Some("Wallet address must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_post_content_valid() {
        assert!(validate_post_content("gm").is_ok());
        assert!(validate_post_content(&"a".repeat(140)).is_ok());
        // multibyte characters count once
        assert!(validate_post_content(&"é".repeat(140)).is_ok());
    }

    #[test]
    fn test_validate_post_content_invalid() {
        assert!(validate_post_content("").is_err());
        assert!(validate_post_content("   \n").is_err());
        assert!(validate_post_content(&"a".repeat(141)).is_err());
    }

    #[test]
    fn test_validate_wallet_address() {
        assert!(validate_wallet_address("0xabc123").is_ok());
        assert!(validate_wallet_address("").is_err());
        assert!(validate_wallet_address("0xabc 123").is_err());
        assert!(validate_wallet_address(&"f".repeat(129)).is_err());
    }
}
