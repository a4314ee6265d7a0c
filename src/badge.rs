use ethers::types::Address;
use serde::Serialize;

/// Badge tier as stored by the contract's `uint8 rarity` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum Rarity {
    Common = 0,
    Rare = 1,
    Epic = 2,
    Legendary = 3,
}

impl Rarity {
    /// Keyword match on the quest title. "advanced"/"blockdag" win over
    /// "intermediate", which wins over "intro".
    pub fn from_title(title: &str) -> Self {
        let title = title.to_lowercase();
        if title.contains("advanced") || title.contains("blockdag") {
            Rarity::Legendary
        } else if title.contains("intermediate") {
            Rarity::Epic
        } else if title.contains("intro") {
            Rarity::Rare
        } else {
            Rarity::Common
        }
    }

    /// Tier by quest XP reward.
    pub fn from_xp(xp: u32) -> Self {
        if xp >= 70 {
            Rarity::Legendary
        } else if xp >= 50 {
            Rarity::Epic
        } else if xp >= 30 {
            Rarity::Rare
        } else {
            Rarity::Common
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        }
    }
}

const QUEST_ID_MODULUS: u64 = 1_000_000;

/// Numeric quest id for a title: `hash = hash * 31 + char` over Unicode
/// scalar values with wrapping i64 arithmetic, absolute value, mod 1e6.
///
/// Already-deployed contract state is keyed by this value, so it must not change.
pub fn hash_quest_title(title: &str) -> u64 {
    let hash = title
        .chars()
        .fold(0i64, |hash, c| hash.wrapping_mul(31).wrapping_add(c as i64));
    hash.unsigned_abs() % QUEST_ID_MODULUS
}

/// Metadata URI for a quest badge, e.g. `{base}/Advanced-DeFi-Quiz`.
pub fn token_uri(base_url: &str, title: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), title.replace(' ', "-"))
}

/// How a mint request names its quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestRef {
    Id(u64),
    Title(String),
}

impl QuestRef {
    pub fn numeric_id(&self) -> u64 {
        match self {
            QuestRef::Id(id) => *id,
            QuestRef::Title(title) => hash_quest_title(title),
        }
    }
}

impl std::fmt::Display for QuestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestRef::Id(id) => write!(f, "#{}", id),
            QuestRef::Title(title) => write!(f, "{}", title),
        }
    }
}

/// A badge to be minted on every configured network. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    pub recipient: Address,
    pub quest: QuestRef,
    pub token_uri: String,
    pub rarity: Rarity,
}

impl MintRequest {
    /// Request for a completed quest identified by its title. Rarity comes
    /// from the title keywords.
    pub fn for_quest(recipient: Address, title: &str, metadata_base_url: &str) -> Self {
        Self {
            recipient,
            quest: QuestRef::Title(title.to_owned()),
            token_uri: token_uri(metadata_base_url, title),
            rarity: Rarity::from_title(title),
        }
    }

    /// Mints under a catalogue quest id instead of the title hash.
    pub fn with_quest_id(mut self, quest_id: u64) -> Self {
        self.quest = QuestRef::Id(quest_id);
        self
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = rarity;
        self
    }
}
