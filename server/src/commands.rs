//! Administrative commands.
//!
//! Commands arrive either from the server console or in-band as a `Command`
//! packet. A line is trimmed, stripped of one leading `/`, split on
//! whitespace and dispatched on its lowercased first word. Players need to be
//! listed as operators; the console can do anything.

use crate::context::{DisconnectReason, ServerContext};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Who issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Issuer {
    Console,
    Player(u32),
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issuer::Console => f.write_str("console"),
            Issuer::Player(id) => write!(f, "player {}", id),
        }
    }
}

/// A failed command. The message goes back to the issuer; no state was changed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Please enter a command.")]
    Empty,
    #[error("Unknown command: {0}. Type /help for a list of commands.")]
    UnknownCommand(String),
    #[error("Invalid usage: {0}")]
    Usage(String),
    #[error("Invalid argument(s), {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("You don't have permission to use this command.")]
    PermissionDenied,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("command labels cannot be empty")]
    EmptyLabel,
    #[error("command label {0:?} contains whitespace")]
    InvalidLabel(String),
    #[error("command label {0:?} is already registered")]
    Duplicate(String),
}

pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    fn description(&self) -> &str;

    fn usage(&self) -> String {
        format!("/{}", self.name())
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        issuer: Issuer,
        args: &[&str],
    ) -> Result<String, CommandError>;
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Box<dyn Command>>,
    labels: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command.
    pub fn with_builtins() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Box::new(Help))?;
        registry.register(Box::new(BoardSize))?;
        registry.register(Box::new(Start))?;
        registry.register(Box::new(Stop))?;
        registry.register(Box::new(Reset))?;
        registry.register(Box::new(Lock { locked: true }))?;
        registry.register(Box::new(Lock { locked: false }))?;
        registry.register(Box::new(Kick))?;
        registry.register(Box::new(Players))?;
        registry.register(Box::new(Joins))?;
        Ok(registry)
    }

    /// Adds a command under its name and aliases, all lowercased.
    ///
    /// Fails without registering anything if any label is empty, contains
    /// whitespace or is already taken.
    pub fn register(&mut self, command: Box<dyn Command>) -> Result<(), RegistryError> {
        let mut labels = vec![command.name().to_lowercase()];
        labels.extend(command.aliases().iter().map(|alias| alias.to_lowercase()));

        for (i, label) in labels.iter().enumerate() {
            if label.is_empty() {
                return Err(RegistryError::EmptyLabel);
            }
            if label.chars().any(char::is_whitespace) {
                return Err(RegistryError::InvalidLabel(label.clone()));
            }
            if self.labels.contains_key(label) || labels[..i].contains(label) {
                return Err(RegistryError::Duplicate(label.clone()));
            }
        }

        let index = self.commands.len();
        self.commands.push(command);
        for label in labels {
            self.labels.insert(label, index);
        }
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<&dyn Command> {
        self.labels
            .get(&label.to_lowercase())
            .map(|index| self.commands[*index].as_ref())
    }

    pub fn commands(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.iter().map(|command| command.as_ref())
    }

    pub fn dispatch(
        &self,
        ctx: &mut ServerContext,
        issuer: Issuer,
        line: &str,
    ) -> Result<String, CommandError> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let mut words = line.split_whitespace();
        let label = words.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = words.collect();

        let command = self
            .get(label)
            .ok_or_else(|| CommandError::UnknownCommand(label.to_string()))?;

        if let Issuer::Player(id) = issuer {
            let allowed = ctx
                .game
                .player(id)
                .map_or(false, |player| ctx.config.is_operator(&player.name));
            if !allowed {
                return Err(CommandError::PermissionDenied);
            }
        }

        command.execute(ctx, issuer, &args)
    }
}

struct Help;

impl Command for Help {
    fn name(&self) -> &str {
        "help"
    }

    fn aliases(&self) -> &[&str] {
        &["?"]
    }

    fn description(&self) -> &str {
        "List the available commands"
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        _args: &[&str],
    ) -> Result<String, CommandError> {
        let names: Vec<String> = ctx
            .commands()
            .commands()
            .map(|command| command.usage())
            .collect();
        Ok(format!("Commands: {}", names.join(", ")))
    }
}

struct BoardSize;

impl Command for BoardSize {
    fn name(&self) -> &str {
        "boardsize"
    }

    fn aliases(&self) -> &[&str] {
        &["setboardsize", "changeboardsize"]
    }

    fn description(&self) -> &str {
        "Resize the board and clear it"
    }

    fn usage(&self) -> String {
        "/boardsize width height".to_string()
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        args: &[&str],
    ) -> Result<String, CommandError> {
        let [width, height] = args else {
            return Err(CommandError::Usage(self.usage()));
        };
        let (Ok(width), Ok(height)) = (width.parse::<u32>(), height.parse::<u32>()) else {
            return Err(CommandError::InvalidArgument(
                "width and height should be integers.".to_string(),
            ));
        };
        ctx.game.resize(width, height)?;
        Ok(format!("The board is now {}x{}.", width, height))
    }
}

struct Start;

impl Command for Start {
    fn name(&self) -> &str {
        "start"
    }

    fn aliases(&self) -> &[&str] {
        &["begin"]
    }

    fn description(&self) -> &str {
        "Start the match"
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        _args: &[&str],
    ) -> Result<String, CommandError> {
        if ctx.start_match()? {
            Ok("The game has started.".to_string())
        } else {
            Ok("The game is already running.".to_string())
        }
    }
}

struct Stop;

impl Command for Stop {
    fn name(&self) -> &str {
        "stop"
    }

    fn aliases(&self) -> &[&str] {
        &["end"]
    }

    fn description(&self) -> &str {
        "End the match and record results"
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        _args: &[&str],
    ) -> Result<String, CommandError> {
        match ctx.end_match() {
            Some(_) => Ok("The game has ended.".to_string()),
            None => Ok("No game is running.".to_string()),
        }
    }
}

struct Reset;

impl Command for Reset {
    fn name(&self) -> &str {
        "reset"
    }

    fn aliases(&self) -> &[&str] {
        &["clear"]
    }

    fn description(&self) -> &str {
        "Clear every cell on the board"
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        _args: &[&str],
    ) -> Result<String, CommandError> {
        ctx.game.reset()?;
        Ok("The board has been cleared.".to_string())
    }
}

struct Lock {
    locked: bool,
}

impl Command for Lock {
    fn name(&self) -> &str {
        if self.locked {
            "lock"
        } else {
            "unlock"
        }
    }

    fn description(&self) -> &str {
        if self.locked {
            "Stop players from placing cells"
        } else {
            "Let players place cells again"
        }
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        _args: &[&str],
    ) -> Result<String, CommandError> {
        let state = if self.locked { "locked" } else { "unlocked" };
        if ctx.game.set_locked(self.locked) {
            Ok(format!("The board is now {}.", state))
        } else {
            Ok(format!("The board is already {}.", state))
        }
    }
}

struct Kick;

impl Command for Kick {
    fn name(&self) -> &str {
        "kick"
    }

    fn description(&self) -> &str {
        "Disconnect a player"
    }

    fn usage(&self) -> String {
        "/kick name [reason]".to_string()
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        args: &[&str],
    ) -> Result<String, CommandError> {
        let Some((name, reason)) = args.split_first() else {
            return Err(CommandError::Usage(self.usage()));
        };
        let (addr, name) = match ctx.clients.find_by_name(name) {
            Some(session) => (session.addr, session.name.clone()),
            None => {
                return Err(CommandError::InvalidArgument(format!(
                    "no player named {}.",
                    name
                )))
            }
        };
        let reason = if reason.is_empty() {
            "You have been kicked.".to_string()
        } else {
            reason.join(" ")
        };
        ctx.disconnect(addr, DisconnectReason::Kicked(reason));
        Ok(format!("Kicked {}.", name))
    }
}

struct Players;

impl Command for Players {
    fn name(&self) -> &str {
        "players"
    }

    fn aliases(&self) -> &[&str] {
        &["list", "who"]
    }

    fn description(&self) -> &str {
        "List connected players"
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        _args: &[&str],
    ) -> Result<String, CommandError> {
        let names: Vec<String> = ctx
            .game
            .players()
            .map(|player| format!("{} (#{})", player.name, player.id))
            .collect();
        if names.is_empty() {
            return Ok("No players online.".to_string());
        }
        Ok(format!(
            "{}/{} players online: {}",
            names.len(),
            ctx.config.max_players,
            names.join(", ")
        ))
    }
}

struct Joins;

impl Command for Joins {
    fn name(&self) -> &str {
        "joins"
    }

    fn aliases(&self) -> &[&str] {
        &["acceptjoins"]
    }

    fn description(&self) -> &str {
        "Allow or refuse new players"
    }

    fn usage(&self) -> String {
        "/joins on|off".to_string()
    }

    fn execute(
        &self,
        ctx: &mut ServerContext,
        _issuer: Issuer,
        args: &[&str],
    ) -> Result<String, CommandError> {
        let accepting = match args {
            [value] => match value.to_ascii_lowercase().as_str() {
                "on" | "true" | "yes" => true,
                "off" | "false" | "no" => false,
                _ => {
                    return Err(CommandError::InvalidArgument(
                        "expected on or off.".to_string(),
                    ))
                }
            },
            _ => return Err(CommandError::Usage(self.usage())),
        };
        ctx.clients.set_accepting(accepting);
        if accepting {
            Ok("New players can join.".to_string())
        } else {
            Ok("New players will be turned away.".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::network::GameMessage;
    use crate::stats::MemoryStats;
    use shared::{Cell, Frame, Packet, Phase};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::sync::mpsc;

    struct Echo;

    impl Command for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn aliases(&self) -> &[&str] {
            &["say"]
        }

        fn description(&self) -> &str {
            "Repeat the arguments"
        }

        fn execute(
            &self,
            _ctx: &mut ServerContext,
            _issuer: Issuer,
            args: &[&str],
        ) -> Result<String, CommandError> {
            Ok(args.join(" "))
        }
    }

    fn context(config: ServerConfig) -> (ServerContext, mpsc::UnboundedReceiver<GameMessage>) {
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(CommandRegistry::with_builtins().unwrap());
        let ctx = ServerContext::new(config, Box::new(MemoryStats::new()), registry, game_tx);
        (ctx, game_rx)
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn join(ctx: &mut ServerContext, name: &str, port: u16) {
        ctx.handle_frame(
            Frame::Packet(Packet::Join {
                name: name.to_string(),
            }),
            addr(port),
            Instant::now(),
        );
    }

    #[test]
    fn test_register_lowercases_and_rejects_collisions() {
        let mut registry = CommandRegistry::new();
        registry.register(Box::new(Echo)).unwrap();

        assert!(registry.get("echo").is_some());
        assert!(registry.get("ECHO").is_some());
        assert!(registry.get("say").is_some());
        assert_eq!(
            registry.register(Box::new(Echo)),
            Err(RegistryError::Duplicate("echo".to_string()))
        );
        assert_eq!(registry.commands().count(), 1);
    }

    #[test]
    fn test_builtins_register_cleanly() {
        let registry = CommandRegistry::with_builtins().unwrap();
        for label in [
            "boardsize",
            "setboardsize",
            "changeboardsize",
            "start",
            "begin",
            "stop",
            "end",
            "reset",
            "clear",
            "lock",
            "unlock",
            "kick",
            "players",
            "list",
            "who",
            "joins",
            "acceptjoins",
            "help",
        ] {
            assert!(registry.get(label).is_some(), "missing {}", label);
        }
    }

    #[test]
    fn test_dispatch_errors() {
        let (mut ctx, _rx) = context(ServerConfig::default());
        let registry = CommandRegistry::with_builtins().unwrap();

        assert_eq!(
            registry.dispatch(&mut ctx, Issuer::Console, "   "),
            Err(CommandError::Empty)
        );
        assert_eq!(
            registry.dispatch(&mut ctx, Issuer::Console, "/teleport"),
            Err(CommandError::UnknownCommand("teleport".to_string()))
        );
    }

    #[test]
    fn test_boardsize_usage_and_arguments() {
        let (mut ctx, _rx) = context(ServerConfig::default());
        let registry = CommandRegistry::with_builtins().unwrap();

        let err = registry
            .dispatch(&mut ctx, Issuer::Console, "/boardsize 8")
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid usage: /boardsize width height");

        let err = registry
            .dispatch(&mut ctx, Issuer::Console, "/boardsize eight six")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument(s), width and height should be integers."
        );

        let err = registry
            .dispatch(&mut ctx, Issuer::Console, "/boardsize 0 6")
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Config(ConfigError::InvalidBoardSize { .. })
        ));
        assert_eq!(ctx.game.board().unwrap().width(), 10);
    }

    #[test]
    fn test_boardsize_clears_board() {
        let (mut ctx, _rx) = context(ServerConfig {
            board_size: Some((5, 5)),
            ..Default::default()
        });
        let registry = CommandRegistry::with_builtins().unwrap();
        join(&mut ctx, "Alice", 1);
        ctx.start_match().unwrap();
        ctx.game.click(0, Cell::new(1, 1));

        let reply = registry
            .dispatch(&mut ctx, Issuer::Console, "setboardsize 8 6")
            .unwrap();
        assert_eq!(reply, "The board is now 8x6.");

        let board = ctx.game.board().unwrap();
        assert_eq!((board.width(), board.height()), (8, 6));
        assert_eq!(board.claimed(), 0);
    }

    #[test]
    fn test_player_needs_operator_rights() {
        let (mut ctx, _rx) = context(ServerConfig {
            operators: vec!["Alice".to_string()],
            ..Default::default()
        });
        let registry = CommandRegistry::with_builtins().unwrap();
        join(&mut ctx, "Alice", 1);
        join(&mut ctx, "Bob", 2);

        assert_eq!(
            registry.dispatch(&mut ctx, Issuer::Player(1), "/start"),
            Err(CommandError::PermissionDenied)
        );
        assert_eq!(ctx.game.phase(), Phase::Lobby);

        assert_eq!(
            registry.dispatch(&mut ctx, Issuer::Player(0), "/START"),
            Ok("The game has started.".to_string())
        );
        assert_eq!(ctx.game.phase(), Phase::InGame);
    }

    #[test]
    fn test_start_without_board() {
        let (mut ctx, _rx) = context(ServerConfig {
            board_size: None,
            ..Default::default()
        });
        let registry = CommandRegistry::with_builtins().unwrap();

        assert_eq!(
            registry.dispatch(&mut ctx, Issuer::Console, "begin"),
            Err(CommandError::Config(ConfigError::BoardNotConfigured))
        );
        assert_eq!(ctx.game.phase(), Phase::Lobby);
    }

    #[test]
    fn test_kick_and_players() {
        let (mut ctx, _rx) = context(ServerConfig::default());
        let registry = CommandRegistry::with_builtins().unwrap();
        join(&mut ctx, "Alice", 1);
        join(&mut ctx, "Bob", 2);

        let listing = registry.dispatch(&mut ctx, Issuer::Console, "who").unwrap();
        assert_eq!(listing, "2/16 players online: Alice (#0), Bob (#1)");

        assert_eq!(
            registry.dispatch(&mut ctx, Issuer::Console, "kick bob being rude"),
            Ok("Kicked Bob.".to_string())
        );
        assert!(ctx.clients.resolve(addr(2)).is_none());
        assert!(ctx.game.player(1).is_none());

        assert!(matches!(
            registry.dispatch(&mut ctx, Issuer::Console, "kick Carol"),
            Err(CommandError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.dispatch(&mut ctx, Issuer::Console, "kick"),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn test_joins_toggle() {
        let (mut ctx, _rx) = context(ServerConfig::default());
        let registry = CommandRegistry::with_builtins().unwrap();

        registry
            .dispatch(&mut ctx, Issuer::Console, "joins off")
            .unwrap();
        assert!(!ctx.clients.is_accepting());
        join(&mut ctx, "Alice", 1);
        assert!(ctx.clients.is_empty());

        registry
            .dispatch(&mut ctx, Issuer::Console, "acceptjoins ON")
            .unwrap();
        assert!(ctx.clients.is_accepting());
        assert!(matches!(
            registry.dispatch(&mut ctx, Issuer::Console, "joins maybe"),
            Err(CommandError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_lock_and_unlock() {
        let (mut ctx, _rx) = context(ServerConfig::default());
        let registry = CommandRegistry::with_builtins().unwrap();

        assert_eq!(
            registry.dispatch(&mut ctx, Issuer::Console, "lock"),
            Ok("The board is now locked.".to_string())
        );
        assert!(ctx.game.is_locked());
        assert_eq!(
            registry.dispatch(&mut ctx, Issuer::Console, "lock"),
            Ok("The board is already locked.".to_string())
        );
        registry
            .dispatch(&mut ctx, Issuer::Console, "unlock")
            .unwrap();
        assert!(!ctx.game.is_locked());
    }
}
