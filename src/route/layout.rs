//! Challenge layout: the grid the route runs on, what lies on each tile,
//! and what has to be collected to win.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunnerError};
use crate::turn::TurnKind;

// ─── Grid pose ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    North,
    East,
    South,
    West,
}

impl Orientation {
    const CLOCKWISE: [Orientation; 4] = [
        Orientation::North,
        Orientation::East,
        Orientation::South,
        Orientation::West,
    ];

    fn index(self) -> usize {
        match self {
            Orientation::North => 0,
            Orientation::East => 1,
            Orientation::South => 2,
            Orientation::West => 3,
        }
    }

    fn rotated(self, quarter_turns_cw: usize) -> Self {
        Self::CLOCKWISE[(self.index() + quarter_turns_cw) % 4]
    }

    /// Grid step for one forward move. y grows southward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Orientation::North => (0, -1),
            Orientation::East => (1, 0),
            Orientation::South => (0, 1),
            Orientation::West => (-1, 0),
        }
    }

    pub fn after_turn(self, kind: TurnKind) -> Self {
        match kind {
            TurnKind::Left => self.rotated(3),
            TurnKind::Right => self.rotated(1),
            TurnKind::Back => self.rotated(2),
        }
    }

    /// Case-insensitive name lookup; anything unrecognised faces east.
    pub fn from_name_or_east(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "north" => Orientation::North,
            "east" => Orientation::East,
            "south" => Orientation::South,
            "west" => Orientation::West,
            other => {
                log::warn!("[layout] Unknown direction '{}', facing east", other);
                Orientation::East
            }
        }
    }
}

/// Where the route model thinks the robot is. Never corrected by sensing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPose {
    pub x: i32,
    pub y: i32,
    pub orientation: Orientation,
}

impl GridPose {
    pub fn new(x: i32, y: i32, orientation: Orientation) -> Self {
        Self { x, y, orientation }
    }

    pub fn advance(&mut self) {
        let (dx, dy) = self.orientation.delta();
        self.x += dx;
        self.y += dy;
    }

    pub fn rotate(&mut self, kind: TurnKind) {
        self.orientation = self.orientation.after_turn(kind);
    }

    pub fn tile(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TokenColor {
    Yellow,
    Green,
    Red,
}

impl TokenColor {
    pub const ALL: [TokenColor; 3] = [TokenColor::Yellow, TokenColor::Green, TokenColor::Red];

    pub fn name(self) -> &'static str {
        match self {
            TokenColor::Yellow => "yellow",
            TokenColor::Green => "green",
            TokenColor::Red => "red",
        }
    }
}

impl fmt::Display for TokenColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenColor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yellow" => Ok(TokenColor::Yellow),
            "green" => Ok(TokenColor::Green),
            "red" => Ok(TokenColor::Red),
            _ => Err(format!("unknown token color '{}'", s)),
        }
    }
}

impl TryFrom<String> for TokenColor {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Per-color token counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorCounts {
    pub yellow: u32,
    pub green: u32,
    pub red: u32,
}

impl ColorCounts {
    pub fn get(&self, color: TokenColor) -> u32 {
        match color {
            TokenColor::Yellow => self.yellow,
            TokenColor::Green => self.green,
            TokenColor::Red => self.red,
        }
    }

    pub fn get_mut(&mut self, color: TokenColor) -> &mut u32 {
        match color {
            TokenColor::Yellow => &mut self.yellow,
            TokenColor::Green => &mut self.green,
            TokenColor::Red => &mut self.red,
        }
    }

    pub fn total(&self) -> u32 {
        self.yellow + self.green + self.red
    }
}

// ─── Inventory & victory ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileStock {
    pub counts: ColorCounts,
    pub allowed: bool,
}

impl Default for TileStock {
    fn default() -> Self {
        Self {
            counts: ColorCounts::default(),
            allowed: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Take {
    Taken,
    Empty,
    Forbidden,
}

/// Remaining tokens per tile. Tiles not in the map are empty and collectable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileInventory {
    tiles: HashMap<(i32, i32), TileStock>,
}

impl TileInventory {
    pub fn stock(&self, tile: (i32, i32)) -> TileStock {
        self.tiles.get(&tile).copied().unwrap_or_default()
    }

    pub fn has(&self, tile: (i32, i32), color: TokenColor) -> bool {
        self.stock(tile).counts.get(color) > 0
    }

    /// Remove one token. A gated tile refuses before anything is counted.
    pub fn take(&mut self, tile: (i32, i32), color: TokenColor, enforce_gate: bool) -> Take {
        let Some(stock) = self.tiles.get_mut(&tile) else {
            return Take::Empty;
        };
        if enforce_gate && !stock.allowed {
            return Take::Forbidden;
        }
        let count = stock.counts.get_mut(color);
        if *count == 0 {
            return Take::Empty;
        }
        *count -= 1;
        Take::Taken
    }

    fn add(&mut self, tile: (i32, i32), color: TokenColor, count: u32, allowed: bool) {
        let stock = self.tiles.entry(tile).or_default();
        *stock.counts.get_mut(color) += count;
        stock.allowed &= allowed;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryTally {
    pub required: ColorCounts,
    pub collected: ColorCounts,
}

impl VictoryTally {
    pub fn new(required: ColorCounts) -> Self {
        Self {
            required,
            collected: ColorCounts::default(),
        }
    }

    pub fn record(&mut self, color: TokenColor) {
        *self.collected.get_mut(color) += 1;
    }

    /// Exact match on every color. Over-collecting loses too.
    pub fn is_victory(&self) -> bool {
        self.collected == self.required
    }
}

// ─── Challenge JSON ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobotStart {
    pub tile: TileCoord,
    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_direction() -> String {
    "east".to_string()
}

fn default_count() -> u32 {
    1
}

fn default_allowed() -> bool {
    true
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryTile {
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Rendering hint for the editor; carried but unused here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread: Option<f64>,
    #[serde(default = "default_allowed")]
    pub allowed_collect: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatteryGroup {
    #[serde(default)]
    pub tiles: Vec<BatteryTile>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VictorySpec {
    #[serde(default)]
    pub by_type: Vec<ColorCounts>,
}

/// A challenge as exported by the block editor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeLayout {
    pub robot: RobotStart,
    #[serde(default)]
    pub batteries: Vec<BatteryGroup>,
    #[serde(default)]
    pub victory: VictorySpec,
    /// Block kinds the player may use. Empty means unrestricted.
    #[serde(default)]
    pub statement: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_cards: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cards: Option<usize>,
}

impl ChallengeLayout {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let layout: ChallengeLayout =
            serde_json::from_str(json).map_err(|e| RunnerError::Layout(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_cards, self.max_cards) {
            if min > max {
                return Err(RunnerError::Layout(format!(
                    "minCards ({}) exceeds maxCards ({})",
                    min, max
                )));
            }
        }
        Ok(())
    }

    pub fn start_pose(&self) -> GridPose {
        GridPose::new(
            self.robot.tile.x,
            self.robot.tile.y,
            Orientation::from_name_or_east(&self.robot.direction),
        )
    }

    /// Merge every battery entry into per-tile stock. Entries on the same
    /// tile add up; one non-collectable entry gates the whole tile.
    pub fn inventory(&self) -> TileInventory {
        let mut inventory = TileInventory::default();
        for tile in self.batteries.iter().flat_map(|group| group.tiles.iter()) {
            let color = match tile.kind.as_deref() {
                None => TokenColor::Yellow,
                Some(name) => match name.parse() {
                    Ok(color) => color,
                    Err(e) => {
                        log::warn!("[layout] Skipping tile ({}, {}): {}", tile.x, tile.y, e);
                        continue;
                    }
                },
            };
            inventory.add((tile.x, tile.y), color, tile.count, tile.allowed_collect);
        }
        inventory
    }

    pub fn required(&self) -> ColorCounts {
        self.victory
            .by_type
            .iter()
            .fold(ColorCounts::default(), |mut acc, entry| {
                for color in TokenColor::ALL {
                    *acc.get_mut(color) += entry.get(color);
                }
                acc
            })
    }
}

/// The stock single-tile challenge used across the route tests.
#[cfg(test)]
pub(crate) const SAMPLE_CHALLENGE: &str = r#"{
    "robot": {"tile": {"x": 1, "y": 1}, "direction": "east"},
    "batteries": [{
        "tiles": [
            {"x": 3, "y": 1, "count": 1, "type": "yellow", "spread": 1.0, "allowedCollect": false}
        ]
    }],
    "victory": {"byType": [{"red": 0, "yellow": 2, "green": 0}]},
    "statement": ["forward", "collect"],
    "minCards": 2,
    "maxCards": 3
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_challenge() {
        let layout = ChallengeLayout::from_json_str(SAMPLE_CHALLENGE).unwrap();

        assert_eq!(layout.start_pose(), GridPose::new(1, 1, Orientation::East));
        assert_eq!(layout.required().yellow, 2);
        assert_eq!(layout.required().total(), 2);
        assert_eq!(layout.min_cards, Some(2));

        let stock = layout.inventory().stock((3, 1));
        assert_eq!(stock.counts.yellow, 1);
        assert!(!stock.allowed);
    }

    #[test]
    fn test_pose_moves_and_turns() {
        let mut pose = GridPose::new(0, 0, Orientation::North);
        pose.advance();
        assert_eq!(pose.tile(), (0, -1));

        pose.rotate(TurnKind::Left);
        assert_eq!(pose.orientation, Orientation::West);
        pose.rotate(TurnKind::Right);
        pose.rotate(TurnKind::Right);
        assert_eq!(pose.orientation, Orientation::East);
        pose.rotate(TurnKind::Back);
        assert_eq!(pose.orientation, Orientation::West);
        pose.advance();
        assert_eq!(pose.tile(), (-1, -1));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let json = r#"{
            "robot": {"tile": {"x": 0, "y": 0}, "direction": "up"},
            "batteries": [{"tiles": [{"x": 2, "y": 0}, {"x": 2, "y": 0, "type": "RED", "count": 3}]}]
        }"#;
        let layout = ChallengeLayout::from_json_str(json).unwrap();

        assert_eq!(layout.start_pose().orientation, Orientation::East);
        let stock = layout.inventory().stock((2, 0));
        assert_eq!(stock.counts, ColorCounts { yellow: 1, green: 0, red: 3 });
        assert!(stock.allowed);
        assert_eq!(layout.required(), ColorCounts::default());
    }

    #[test]
    fn test_inventory_take() {
        let layout = ChallengeLayout::from_json_str(SAMPLE_CHALLENGE).unwrap();
        let mut inventory = layout.inventory();

        assert_eq!(inventory.take((3, 1), TokenColor::Yellow, true), Take::Forbidden);
        assert_eq!(inventory.take((3, 1), TokenColor::Yellow, false), Take::Taken);
        assert_eq!(inventory.take((3, 1), TokenColor::Yellow, false), Take::Empty);
        assert_eq!(inventory.take((9, 9), TokenColor::Red, true), Take::Empty);
        assert!(!inventory.has((3, 1), TokenColor::Yellow));
    }

    #[test]
    fn test_victory_requires_exact_counts() {
        let mut tally = VictoryTally::new(ColorCounts {
            yellow: 1,
            green: 0,
            red: 1,
        });
        assert!(!tally.is_victory());
        tally.record(TokenColor::Yellow);
        assert!(!tally.is_victory());
        tally.record(TokenColor::Red);
        assert!(tally.is_victory());
        tally.record(TokenColor::Red);
        assert!(!tally.is_victory());
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!("Yellow".parse::<TokenColor>(), Ok(TokenColor::Yellow));
        assert!("blue".parse::<TokenColor>().is_err());
        let color: TokenColor = serde_json::from_str("\"GREEN\"").unwrap();
        assert_eq!(color, TokenColor::Green);
        assert_eq!(serde_json::to_string(&TokenColor::Red).unwrap(), "\"red\"");
    }

    #[test]
    fn test_rejects_inverted_card_bounds() {
        let json = r#"{"robot": {"tile": {"x": 0, "y": 0}}, "minCards": 5, "maxCards": 2}"#;
        assert!(matches!(
            ChallengeLayout::from_json_str(json),
            Err(RunnerError::Layout(_))
        ));
    }
}
