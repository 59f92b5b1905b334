use crate::{MAX_NAME_LEN, MIN_NAME_LEN};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Display color assigned to a player by the server.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const PALETTE: [Color; 12] = [
    Color::rgb(231, 76, 60),
    Color::rgb(52, 152, 219),
    Color::rgb(46, 204, 113),
    Color::rgb(241, 196, 15),
    Color::rgb(155, 89, 182),
    Color::rgb(230, 126, 34),
    Color::rgb(26, 188, 156),
    Color::rgb(236, 64, 122),
    Color::rgb(52, 73, 94),
    Color::rgb(149, 165, 166),
    Color::rgb(127, 140, 141),
    Color::rgb(192, 57, 43),
];

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Picks a palette color from the player id, cycling once the palette runs out.
    pub fn for_player(player_id: u32) -> Self {
        PALETTE[player_id as usize % PALETTE.len()]
    }
}

/// Long-term statistics loaded when a player joins and saved when they leave.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct PlayerStats {
    pub games_played: u32,
    pub wins: u32,
    pub cells_captured: u64,
}

/// Identity and live display state of a player.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerInfo {
    pub id: u32,
    pub name: String,
    pub color: Color,
    pub stats: PlayerStats,
    pub cursor_x: f32,
    pub cursor_y: f32,
}

impl PlayerInfo {
    /// Creates a player with the cursor centered on the board.
    pub fn new(id: u32, name: impl Into<String>, color: Color, stats: PlayerStats) -> Self {
        Self {
            id,
            name: name.into(),
            color,
            stats,
            cursor_x: 0.5,
            cursor_y: 0.5,
        }
    }

    /// Moves the cursor, clamping both coordinates into [0, 1].
    pub fn set_cursor(&mut self, x: f32, y: f32) {
        self.cursor_x = clamp_unit(x);
        self.cursor_y = clamp_unit(y);
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.5
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Why a requested player name was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Your name should have at least 3 characters.")]
    TooShort,
    #[error("Your name can't have more than 20 characters.")]
    TooLong,
    #[error("Your name can only have letters, numbers and underscores.")]
    InvalidCharacters,
}

/// Checks a player name against the length and charset rules.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    let len = name.chars().count();
    if len < MIN_NAME_LEN {
        return Err(NameError::TooShort);
    }
    if len > MAX_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(NameError::InvalidCharacters);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_player_creation() {
        let player = PlayerInfo::new(3, "Alice", Color::for_player(3), PlayerStats::default());
        assert_eq!(player.id, 3);
        assert_eq!(player.name, "Alice");
        assert_eq!(player.color, Color::for_player(3));
        assert_approx_eq!(player.cursor_x, 0.5);
        assert_approx_eq!(player.cursor_y, 0.5);
    }

    #[test]
    fn test_cursor_is_clamped() {
        let mut player = PlayerInfo::new(0, "Bob", Color::for_player(0), PlayerStats::default());

        player.set_cursor(0.25, 0.75);
        assert_approx_eq!(player.cursor_x, 0.25);
        assert_approx_eq!(player.cursor_y, 0.75);

        player.set_cursor(-3.0, 7.5);
        assert_approx_eq!(player.cursor_x, 0.0);
        assert_approx_eq!(player.cursor_y, 1.0);

        player.set_cursor(f32::NAN, 0.1);
        assert_approx_eq!(player.cursor_x, 0.5);
        assert_approx_eq!(player.cursor_y, 0.1);
    }

    #[test]
    fn test_palette_cycles() {
        assert_eq!(Color::for_player(0), Color::for_player(PALETTE.len() as u32));
        assert_ne!(Color::for_player(0), Color::for_player(1));
    }

    #[test]
    fn test_valid_names() {
        for name in ["Bob", "Alice", "a_b", "player_123", "ABCDEFGHIJKLMNOPQRST", "___"] {
            assert_eq!(validate_name(name), Ok(()), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(validate_name(""), Err(NameError::TooShort));
        assert_eq!(validate_name("ab"), Err(NameError::TooShort));
        assert_eq!(
            validate_name("ABCDEFGHIJKLMNOPQRSTU"),
            Err(NameError::TooLong)
        );
        assert_eq!(validate_name("bad name"), Err(NameError::InvalidCharacters));
        assert_eq!(validate_name("dash-ed"), Err(NameError::InvalidCharacters));
        assert_eq!(validate_name("émile"), Err(NameError::InvalidCharacters));
    }

    #[test]
    fn test_name_error_messages() {
        assert_eq!(
            NameError::TooShort.to_string(),
            "Your name should have at least 3 characters."
        );
        assert_eq!(
            NameError::TooLong.to_string(),
            "Your name can't have more than 20 characters."
        );
    }
}
