//! Static catalogs: crops, animals, achievements, gem packages and upgrades.
//!
//! Tables are ordered the way the shop lists them and are looked up by id.

use crate::{Achievement, Condition, ConditionKind, Reward};
use serde::Serialize;

/// A seed the player can plant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CropDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    /// Seconds from planting to harvest.
    pub growth_time: u64,
    /// Seed cost in coins.
    pub price: u64,
    /// Coins per harvested unit.
    pub sell_price: u64,
    /// Units produced by one harvest.
    pub harvest_amount: u64,
    /// Minimum player level.
    pub level: u32,
}

impl CropDefinition {
    /// Coins credited by one harvest.
    pub fn harvest_value(&self) -> u64 {
        self.sell_price.saturating_mul(self.harvest_amount)
    }
}

/// What an animal yields on each collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDefinition {
    pub name: &'static str,
    pub icon: &'static str,
    pub sell_price: u64,
    pub amount: u64,
}

/// An animal the player can buy for the barn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    /// Seconds between collections.
    pub production_time: u64,
    pub price: u64,
    pub level: u32,
    pub product: ProductDefinition,
}

impl AnimalDefinition {
    /// Coins credited by one collection.
    pub fn collection_value(&self) -> u64 {
        self.product.sell_price.saturating_mul(self.product.amount)
    }
}

/// Catalog entry an [`Achievement`] instance is created from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AchievementDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub condition: Condition,
    pub reward: Reward,
}

impl AchievementDefinition {
    /// A fresh, locked copy for a new save.
    pub fn to_instance(&self) -> Achievement {
        Achievement {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            condition: self.condition,
            reward: self.reward,
            unlocked: false,
        }
    }
}

/// Gem bundle offered in the premium shop. Payment is stubbed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GemPackage {
    pub id: &'static str,
    pub gems: u64,
    pub price_cents: u64,
    pub discount_percent: u8,
    pub popular: bool,
}

/// Farm improvements bought with gems.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKind {
    /// One more arable plot.
    ExpandField,
    /// Two more barn slots.
    ExpandBarn,
    /// Moves every growing crop's harvest time earlier.
    GrowthBoost,
}

impl UpgradeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "expand_field" | "field" => Some(Self::ExpandField),
            "expand_barn" | "barn" => Some(Self::ExpandBarn),
            "growth_boost" | "boost" => Some(Self::GrowthBoost),
            _ => None,
        }
    }
}

/// Price and effect size of an upgrade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Upgrade {
    pub kind: UpgradeKind,
    pub name: &'static str,
    pub gem_cost: u64,
    /// Plots, barn slots, or seconds of growth skipped, depending on `kind`.
    pub amount: u64,
}

pub static CROPS: &[CropDefinition] = &[
    CropDefinition {
        id: "wheat",
        name: "Wheat",
        icon: "🌾",
        growth_time: 30,
        price: 20,
        sell_price: 8,
        harvest_amount: 5,
        level: 1,
    },
    CropDefinition {
        id: "carrot",
        name: "Carrot",
        icon: "🥕",
        growth_time: 60,
        price: 50,
        sell_price: 15,
        harvest_amount: 5,
        level: 1,
    },
    CropDefinition {
        id: "potato",
        name: "Potato",
        icon: "🥔",
        growth_time: 120,
        price: 80,
        sell_price: 20,
        harvest_amount: 6,
        level: 2,
    },
    CropDefinition {
        id: "tomato",
        name: "Tomato",
        icon: "🍅",
        growth_time: 180,
        price: 120,
        sell_price: 30,
        harvest_amount: 5,
        level: 3,
    },
    CropDefinition {
        id: "corn",
        name: "Corn",
        icon: "🌽",
        growth_time: 240,
        price: 150,
        sell_price: 25,
        harvest_amount: 8,
        level: 4,
    },
    CropDefinition {
        id: "strawberry",
        name: "Strawberry",
        icon: "🍓",
        growth_time: 300,
        price: 200,
        sell_price: 45,
        harvest_amount: 6,
        level: 5,
    },
    CropDefinition {
        id: "sunflower",
        name: "Sunflower",
        icon: "🌻",
        growth_time: 420,
        price: 260,
        sell_price: 40,
        harvest_amount: 8,
        level: 6,
    },
    CropDefinition {
        id: "pumpkin",
        name: "Pumpkin",
        icon: "🎃",
        growth_time: 600,
        price: 350,
        sell_price: 90,
        harvest_amount: 5,
        level: 7,
    },
];

pub static ANIMALS: &[AnimalDefinition] = &[
    AnimalDefinition {
        id: "chicken",
        name: "Chicken",
        icon: "🐔",
        production_time: 180,
        price: 100,
        level: 1,
        product: ProductDefinition {
            name: "Eggs",
            icon: "🥚",
            sell_price: 30,
            amount: 3,
        },
    },
    AnimalDefinition {
        id: "cow",
        name: "Cow",
        icon: "🐄",
        production_time: 360,
        price: 300,
        level: 3,
        product: ProductDefinition {
            name: "Milk",
            icon: "🥛",
            sell_price: 80,
            amount: 2,
        },
    },
    AnimalDefinition {
        id: "sheep",
        name: "Sheep",
        icon: "🐑",
        production_time: 480,
        price: 500,
        level: 5,
        product: ProductDefinition {
            name: "Wool",
            icon: "🧶",
            sell_price: 150,
            amount: 2,
        },
    },
    AnimalDefinition {
        id: "pig",
        name: "Pig",
        icon: "🐷",
        production_time: 300,
        price: 250,
        level: 4,
        product: ProductDefinition {
            name: "Bacon",
            icon: "🥓",
            sell_price: 100,
            amount: 3,
        },
    },
    AnimalDefinition {
        id: "goat",
        name: "Goat",
        icon: "🐐",
        production_time: 420,
        price: 450,
        level: 7,
        product: ProductDefinition {
            name: "Goat cheese",
            icon: "🧀",
            sell_price: 120,
            amount: 2,
        },
    },
];

const fn achievement(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    kind: ConditionKind,
    value: u64,
    reward: Reward,
) -> AchievementDefinition {
    AchievementDefinition {
        id,
        name,
        description,
        icon,
        condition: Condition { kind, value },
        reward,
    }
}

const fn reward(coins: Option<u64>, experience: Option<u64>, gems: Option<u64>) -> Reward {
    Reward {
        coins,
        experience,
        gems,
    }
}

pub static ACHIEVEMENTS: &[AchievementDefinition] = &[
    achievement(
        "first_harvest",
        "First Harvest",
        "Harvest your first crop",
        "🌱",
        ConditionKind::CropsHarvested,
        1,
        reward(Some(50), Some(20), None),
    ),
    achievement(
        "harvest_master",
        "Harvest Master",
        "Harvest 50 crops",
        "🧑‍🌾",
        ConditionKind::CropsHarvested,
        50,
        reward(Some(500), None, Some(5)),
    ),
    achievement(
        "animal_friend",
        "Animal Friend",
        "Collect your first animal product",
        "🐣",
        ConditionKind::AnimalsCollected,
        1,
        reward(Some(50), Some(20), None),
    ),
    achievement(
        "rancher",
        "Rancher",
        "Collect animal products 25 times",
        "🤠",
        ConditionKind::AnimalsCollected,
        25,
        reward(Some(300), None, Some(3)),
    ),
    achievement(
        "rich_farmer",
        "Rich Farmer",
        "Earn 1,000 coins",
        "💰",
        ConditionKind::CoinsEarned,
        1_000,
        reward(None, None, Some(5)),
    ),
    achievement(
        "tycoon",
        "Farm Tycoon",
        "Earn 10,000 coins",
        "🏦",
        ConditionKind::CoinsEarned,
        10_000,
        reward(None, Some(200), Some(20)),
    ),
    achievement(
        "growing_up",
        "Growing Up",
        "Reach level 5",
        "⭐",
        ConditionKind::LevelReached,
        5,
        reward(Some(250), None, Some(5)),
    ),
    achievement(
        "veteran",
        "Veteran Farmer",
        "Reach level 10",
        "🏆",
        ConditionKind::LevelReached,
        10,
        reward(Some(1_000), None, Some(10)),
    ),
    achievement(
        "merchant",
        "Merchant",
        "Sell 100 products",
        "🛒",
        ConditionKind::ProductsSold,
        100,
        reward(Some(200), Some(50), None),
    ),
];

pub static GEM_PACKAGES: &[GemPackage] = &[
    GemPackage {
        id: "starter",
        gems: 50,
        price_cents: 99,
        discount_percent: 0,
        popular: false,
    },
    GemPackage {
        id: "basic",
        gems: 120,
        price_cents: 199,
        discount_percent: 10,
        popular: false,
    },
    GemPackage {
        id: "premium",
        gems: 300,
        price_cents: 449,
        discount_percent: 20,
        popular: true,
    },
    GemPackage {
        id: "mega",
        gems: 700,
        price_cents: 899,
        discount_percent: 30,
        popular: false,
    },
    GemPackage {
        id: "ultimate",
        gems: 1_500,
        price_cents: 1_699,
        discount_percent: 40,
        popular: false,
    },
];

pub static UPGRADES: &[Upgrade] = &[
    Upgrade {
        kind: UpgradeKind::ExpandField,
        name: "New plot",
        gem_cost: 50,
        amount: 1,
    },
    Upgrade {
        kind: UpgradeKind::ExpandBarn,
        name: "Barn extension",
        gem_cost: 100,
        amount: 2,
    },
    Upgrade {
        kind: UpgradeKind::GrowthBoost,
        name: "Growth boost",
        gem_cost: 30,
        amount: 2 * 60 * 60,
    },
];

pub fn crop(id: &str) -> Option<&'static CropDefinition> {
    CROPS.iter().find(|c| c.id == id)
}

pub fn animal(id: &str) -> Option<&'static AnimalDefinition> {
    ANIMALS.iter().find(|a| a.id == id)
}

pub fn achievement_definition(id: &str) -> Option<&'static AchievementDefinition> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

pub fn gem_package(id: &str) -> Option<&'static GemPackage> {
    GEM_PACKAGES.iter().find(|p| p.id == id)
}

pub fn upgrade(kind: UpgradeKind) -> &'static Upgrade {
    match kind {
        UpgradeKind::ExpandField => &UPGRADES[0],
        UpgradeKind::ExpandBarn => &UPGRADES[1],
        UpgradeKind::GrowthBoost => &UPGRADES[2],
    }
}

/// Unit sell price of an inventory product, by display name.
///
/// Crops are sold under their own name, animal products under the product name.
pub fn unit_price(product_name: &str) -> Option<u64> {
    CROPS
        .iter()
        .find(|c| c.name == product_name)
        .map(|c| c.sell_price)
        .or_else(|| {
            ANIMALS
                .iter()
                .find(|a| a.product.name == product_name)
                .map(|a| a.product.sell_price)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn ids_are_unique() {
        let crops: BTreeSet<_> = CROPS.iter().map(|c| c.id).collect();
        assert_eq!(crops.len(), CROPS.len());
        let animals: BTreeSet<_> = ANIMALS.iter().map(|a| a.id).collect();
        assert_eq!(animals.len(), ANIMALS.len());
        let achievements: BTreeSet<_> = ACHIEVEMENTS.iter().map(|a| a.id).collect();
        assert_eq!(achievements.len(), ACHIEVEMENTS.len());
    }

    #[test]
    fn starter_content_is_level_one() {
        assert!(CROPS.iter().any(|c| c.level == 1 && c.price == 50));
        assert!(ANIMALS.iter().any(|a| a.level == 1));
        assert!(CROPS.iter().all(|c| c.growth_time > 0 && c.harvest_amount > 0));
        assert!(ANIMALS.iter().all(|a| a.production_time > 0));
    }

    #[test]
    fn upgrade_lookup_matches_kind() {
        for u in UPGRADES {
            assert_eq!(upgrade(u.kind).kind, u.kind);
        }
        assert_eq!(UpgradeKind::parse("barn"), Some(UpgradeKind::ExpandBarn));
        assert_eq!(UpgradeKind::parse("silo"), None);
    }

    #[test]
    fn unit_price_covers_crops_and_products() {
        assert_eq!(unit_price("Wheat"), Some(8));
        assert_eq!(unit_price("Eggs"), Some(30));
        assert_eq!(unit_price("Goat cheese"), Some(120));
        assert_eq!(unit_price("Truffles"), None);
    }

    #[test]
    fn values_multiply_price_by_amount() {
        assert_eq!(crop("carrot").map(CropDefinition::harvest_value), Some(75));
        assert_eq!(
            animal("chicken").map(AnimalDefinition::collection_value),
            Some(90)
        );
        assert!(gem_package("premium").is_some_and(|p| p.popular));
    }
}
