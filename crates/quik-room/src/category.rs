//! Round categories.
//!
//! Every round is played against a category ("Pizza toppings", "Authors",
//! ...). Categories are grouped by difficulty; selection first picks a
//! difficulty, then a category within it, both uniformly.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
    Hardest,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Moderate,
        Difficulty::Hard,
        Difficulty::Hardest,
    ];

    pub fn categories(self) -> &'static [&'static str] {
        match self {
            Self::Easy => EASY,
            Self::Moderate => MODERATE,
            Self::Hard => HARD,
            Self::Hardest => HARDEST,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "Easy"),
            Self::Moderate => write!(f, "Moderate"),
            Self::Hard => write!(f, "Hard"),
            Self::Hardest => write!(f, "Hardest"),
        }
    }
}

/// A category chosen for a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub difficulty: Difficulty,
    pub name: &'static str,
}

/// Picks a category using the thread-local RNG.
pub fn select_category() -> Category {
    select_category_with(&mut rand::rng())
}

/// Picks a category with the given RNG. Pure apart from the RNG state.
pub fn select_category_with<R: Rng + ?Sized>(rng: &mut R) -> Category {
    let difficulty = Difficulty::ALL[rng.random_range(0..Difficulty::ALL.len())];
    let names = difficulty.categories();
    Category {
        difficulty,
        name: names[rng.random_range(0..names.len())],
    }
}

const EASY: &[&str] = &[
    "Electronics",
    "Baked goods",
    "In a doctor's office",
    "5-letter words",
    "Something yellow",
    "Things with buttons",
    "Drinks & Beverages",
    "In the yard or garden",
    "Things at a party",
    "Pizza toppings",
    "In the Jungle",
    "Girl Names",
    "Restaurants",
    "Sports",
];

const MODERATE: &[&str] = &[
    "Desserts",
    "Something round",
    "Candy",
    "Musicians & Musical Groups",
    "Cars & Trucks",
    "Movies",
    "Player's Choice",
    "Plants & Trees",
    "Song titles",
    "Pet names",
    "Ice cream flavours",
    "Hobbies",
    "Actresses",
    "Retail Stores",
];

const HARD: &[&str] = &[
    "Precious Metals & Gemstones",
    "Something Scary",
    "Something wet",
    "At a wedding",
    "Celebrities",
    "Sports Equipment",
    "Cartoons",
    "Fish",
    "Authors",
    "School Subjects",
    "Footwear",
    "Books",
    "Historical Figures",
];

const HARDEST: &[&str] = &[
    "Bodies of Water",
    "Cosmetics & Toiletries",
    "Musical Instruments",
    "In the Ocean",
    "Something Blue",
    "Adjectives",
    "Something Green",
    "Breakfast foods",
    "Weapons",
    "Comedies",
    "Car Terms",
    "Politics and Politicians",
    "Flowers",
];
