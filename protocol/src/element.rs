//! Element system and effectiveness chart.

use serde::{Deserialize, Serialize};

/// Elements available to species and skills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Element {
    Normal = 0,
    Fire = 1,
    Water = 2,
    Grass = 3,
    Electric = 4,
    Ice = 5,
    Ground = 6,
    Flying = 7,
}

impl Element {
    pub const ALL: [Element; 8] = [
        Element::Normal,
        Element::Fire,
        Element::Water,
        Element::Grass,
        Element::Electric,
        Element::Ice,
        Element::Ground,
        Element::Flying,
    ];

    /// Effectiveness multiplier of this element attacking a defender
    pub fn effectiveness(&self, defender: Element) -> f64 {
        ELEMENT_CHART[*self as usize][defender as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Element::Normal => "normal",
            Element::Fire => "fire",
            Element::Water => "water",
            Element::Grass => "grass",
            Element::Electric => "electric",
            Element::Ice => "ice",
            Element::Ground => "ground",
            Element::Flying => "flying",
        }
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row = attacking element, column = defending element.
/// Values: 0.0 = immune, 0.5 = resisted, 1.0 = neutral, 2.0 = effective.
///
/// Order: Normal, Fire, Water, Grass, Electric, Ice, Ground, Flying
#[rustfmt::skip]
pub static ELEMENT_CHART: [[f64; 8]; 8] = [
    // Normal attacking
    [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    // Fire attacking
    [1.0, 0.5, 0.5, 2.0, 1.0, 2.0, 1.0, 1.0],
    // Water attacking
    [1.0, 2.0, 0.5, 0.5, 1.0, 1.0, 2.0, 1.0],
    // Grass attacking
    [1.0, 0.5, 2.0, 0.5, 1.0, 1.0, 2.0, 0.5],
    // Electric attacking
    [1.0, 1.0, 2.0, 0.5, 0.5, 1.0, 0.0, 2.0],
    // Ice attacking
    [1.0, 0.5, 0.5, 2.0, 1.0, 0.5, 2.0, 2.0],
    // Ground attacking
    [1.0, 2.0, 1.0, 0.5, 2.0, 1.0, 1.0, 0.0],
    // Flying attacking
    [1.0, 1.0, 1.0, 2.0, 0.5, 1.0, 1.0, 1.0],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_matchup() {
        assert_eq!(Element::Normal.effectiveness(Element::Fire), 1.0);
    }

    #[test]
    fn test_effective_and_resisted() {
        assert_eq!(Element::Water.effectiveness(Element::Fire), 2.0);
        assert_eq!(Element::Fire.effectiveness(Element::Water), 0.5);
    }

    #[test]
    fn test_immunity() {
        assert_eq!(Element::Electric.effectiveness(Element::Ground), 0.0);
        assert_eq!(Element::Ground.effectiveness(Element::Flying), 0.0);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Element::Fire).unwrap(), "\"fire\"");
    }
}
