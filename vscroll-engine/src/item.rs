use std::hash::{Hash, Hasher};

/// A dataset record. Immutable once loaded; identity is `index`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Item {
    /// Stable absolute index within the logical dataset.
    pub index: usize,
    pub value: String,
    pub text: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub weight: f64,
    pub badge: Option<String>,
    pub avatar: Option<String>,
    pub category: Option<String>,
}

impl Item {
    pub fn from_seed(index: usize, seed: ItemSeed) -> Self {
        Self {
            index,
            value: seed.value,
            text: seed.text,
            description: seed.description,
            tags: seed.tags,
            weight: seed.weight,
            badge: seed.badge,
            avatar: seed.avatar,
            category: seed.category,
        }
    }

    /// Derived key over the rendering-relevant fields, used to detect
    /// reusable cached visual nodes. Two items with the same fingerprint
    /// render identically. Sort-only fields (weight) and search-only fields
    /// (tags) do not participate.
    pub fn fingerprint(&self) -> u64 {
        let mut h = std::hash::DefaultHasher::new();
        self.value.hash(&mut h);
        self.text.hash(&mut h);
        self.description.hash(&mut h);
        self.badge.hash(&mut h);
        self.avatar.hash(&mut h);
        self.category.hash(&mut h);
        h.finish()
    }
}

/// Item fields as produced by a [`crate::ChunkSource`], before the provider
/// tags them with their absolute index.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemSeed {
    pub value: String,
    pub text: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub weight: f64,
    pub badge: Option<String>,
    pub avatar: Option<String>,
    pub category: Option<String>,
}

impl ItemSeed {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}
