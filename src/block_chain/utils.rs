use ethers::abi::{Abi, Token};
use ethers::prelude::*;

use crate::badge::Rarity;
use crate::error::{ChainError, ConfigError};

pub const MINT_BADGE: &str = "mintBadge";
pub const GET_USER_BADGE_COUNT: &str = "getUserBadgeCount";
pub const GET_USER_BADGES: &str = "getUserBadges";

// BadgeNFT contract ABI, limited to the entry points the backend uses
pub const BADGE_ABI: &str = r#"[
    {
        "inputs": [
            {"internalType": "address", "name": "to", "type": "address"},
            {"internalType": "uint256", "name": "questId", "type": "uint256"},
            {"internalType": "string", "name": "tokenURI", "type": "string"},
            {"internalType": "uint8", "name": "rarity", "type": "uint8"}
        ],
        "name": "mintBadge",
        "outputs": [],
        "stateMutability": "nonpayable",
        "type": "function"
    },
    {
        "inputs": [
            {"internalType": "address", "name": "user", "type": "address"}
        ],
        "name": "getUserBadgeCount",
        "outputs": [
            {"internalType": "uint256", "name": "", "type": "uint256"}
        ],
        "stateMutability": "view",
        "type": "function"
    },
    {
        "inputs": [
            {"internalType": "address", "name": "user", "type": "address"}
        ],
        "name": "getUserBadges",
        "outputs": [
            {"internalType": "uint256[]", "name": "", "type": "uint256[]"}
        ],
        "stateMutability": "view",
        "type": "function"
    }
]"#;

pub fn parse_badge_abi() -> Result<Abi, ConfigError> {
    serde_json::from_str(BADGE_ABI).map_err(|e| ConfigError::InvalidAbi(e.to_string()))
}

fn encode(abi: &Abi, function: &'static str, args: &[Token]) -> Result<Bytes, ChainError> {
    let data = abi
        .function(function)
        .and_then(|f| f.encode_input(args))
        .map_err(|e| ChainError::abi(function, e))?;
    Ok(data.into())
}

fn decode(abi: &Abi, function: &'static str, output: &[u8]) -> Result<Vec<Token>, ChainError> {
    abi.function(function)
        .and_then(|f| f.decode_output(output))
        .map_err(|e| ChainError::abi(function, e))
}

/// Calldata for `mintBadge(address,uint256,string,uint8)`.
pub fn encode_mint_badge(
    abi: &Abi,
    recipient: Address,
    quest_id: u64,
    token_uri: &str,
    rarity: Rarity,
) -> Result<Bytes, ChainError> {
    encode(
        abi,
        MINT_BADGE,
        &[
            Token::Address(recipient),
            Token::Uint(U256::from(quest_id)),
            Token::String(token_uri.to_owned()),
            Token::Uint(U256::from(rarity.as_u8())),
        ],
    )
}

pub fn encode_badge_count(abi: &Abi, user: Address) -> Result<Bytes, ChainError> {
    encode(abi, GET_USER_BADGE_COUNT, &[Token::Address(user)])
}

pub fn decode_badge_count(abi: &Abi, output: &[u8]) -> Result<U256, ChainError> {
    match decode(abi, GET_USER_BADGE_COUNT, output)?.into_iter().next() {
        Some(Token::Uint(count)) => Ok(count),
        other => Err(ChainError::abi(
            GET_USER_BADGE_COUNT,
            format!("unexpected output {:?}", other),
        )),
    }
}

pub fn encode_user_badges(abi: &Abi, user: Address) -> Result<Bytes, ChainError> {
    encode(abi, GET_USER_BADGES, &[Token::Address(user)])
}

pub fn decode_user_badges(abi: &Abi, output: &[u8]) -> Result<Vec<U256>, ChainError> {
    match decode(abi, GET_USER_BADGES, output)?.into_iter().next() {
        Some(Token::Array(tokens)) => tokens
            .into_iter()
            .map(|token| match token {
                Token::Uint(id) => Ok(id),
                other => Err(ChainError::abi(
                    GET_USER_BADGES,
                    format!("unexpected element {:?}", other),
                )),
            })
            .collect(),
        other => Err(ChainError::abi(
            GET_USER_BADGES,
            format!("unexpected output {:?}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::{decode as abi_decode, encode as abi_encode, ParamType};
    use ethers::utils::id;

    #[test]
    fn test_mint_badge_selector_and_args() {
        let abi = parse_badge_abi().unwrap();
        let recipient = Address::repeat_byte(0xab);
        let data =
            encode_mint_badge(&abi, recipient, 36877, "https://x/Advanced-DeFi-Quiz", Rarity::Legendary)
                .unwrap();

        assert_eq!(&data[..4], &id("mintBadge(address,uint256,string,uint8)")[..]);

        let args = abi_decode(
            &[
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::String,
                ParamType::Uint(8),
            ],
            &data[4..],
        )
        .unwrap();
        assert_eq!(args[0], Token::Address(recipient));
        assert_eq!(args[1], Token::Uint(U256::from(36877)));
        assert_eq!(args[2], Token::String("https://x/Advanced-DeFi-Quiz".to_owned()));
        assert_eq!(args[3], Token::Uint(U256::from(3)));
    }

    #[test]
    fn test_read_selectors() {
        let abi = parse_badge_abi().unwrap();
        let user = Address::repeat_byte(0x01);
        let count = encode_badge_count(&abi, user).unwrap();
        let badges = encode_user_badges(&abi, user).unwrap();
        assert_eq!(&count[..4], &id("getUserBadgeCount(address)")[..]);
        assert_eq!(&badges[..4], &id("getUserBadges(address)")[..]);
        assert_eq!(count.len(), 4 + 32);
    }

    #[test]
    fn test_decode_badge_count() {
        let abi = parse_badge_abi().unwrap();
        let output = abi_encode(&[Token::Uint(U256::from(5))]);
        assert_eq!(decode_badge_count(&abi, &output).unwrap(), U256::from(5));
    }

    #[test]
    fn test_decode_user_badges() {
        let abi = parse_badge_abi().unwrap();
        let output = abi_encode(&[Token::Array(vec![
            Token::Uint(U256::from(1)),
            Token::Uint(U256::from(2)),
        ])]);
        assert_eq!(
            decode_user_badges(&abi, &output).unwrap(),
            vec![U256::from(1), U256::from(2)]
        );
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        let abi = parse_badge_abi().unwrap();
        assert!(matches!(
            decode_badge_count(&abi, &[0x01, 0x02]),
            Err(ChainError::Abi { function: GET_USER_BADGE_COUNT, .. })
        ));
    }
}
