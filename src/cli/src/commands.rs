/// CommandTuple holds the command word, the maximum number of arguments, the
/// Command variant and a description of the command.
type CommandTuple = (&'static str, u8, Command, &'static str);

/// Every command the interactive loops understand. A command is only
/// accepted in the mode its variant belongs to; session commands work in
/// both.
const COMMANDS: [CommandTuple; 15] = [
    // Session commands
    (
        "help",
        0,
        Command::Session(SessionCommand::Help),
        "Show this help message",
    ),
    (
        "quit",
        0,
        Command::Session(SessionCommand::Quit),
        "Shut down and exit",
    ),
    // Manager commands
    (
        "create",
        1,
        Command::Manager(ManagerCommand::Create),
        "Create a new network and print its config as JSON (name)",
    ),
    (
        "join",
        2,
        Command::Manager(ManagerCommand::Join),
        "Join the network described by a JSON config (name, json)",
    ),
    (
        "leave",
        2,
        Command::Manager(ManagerCommand::Leave),
        "Leave a network; the JSON config defaults to the last one (name, [json])",
    ),
    (
        "config",
        0,
        Command::Manager(ManagerCommand::ShowConfig),
        "Print the current network config",
    ),
    // Adapter commands
    (
        "connect",
        1,
        Command::Adapter(AdapterCommand::Connect),
        "Re-initialize the adapter against a network (json)",
    ),
    (
        "create",
        1,
        Command::Adapter(AdapterCommand::CreateTable),
        "Create a table and attach to it (name)",
    ),
    (
        "load",
        2,
        Command::Adapter(AdapterCommand::LoadTable),
        "Attach to an existing table (name, [address])",
    ),
    (
        "put",
        2,
        Command::Adapter(AdapterCommand::Put),
        "Write one entry (key, value)",
    ),
    (
        "get",
        1,
        Command::Adapter(AdapterCommand::Get),
        "Read the value of a key (key)",
    ),
    (
        "tablescan",
        0,
        Command::Adapter(AdapterCommand::TableScan),
        "Read every entry of the table",
    ),
    (
        "remove",
        1,
        Command::Adapter(AdapterCommand::Remove),
        "Remove a key and its value (key)",
    ),
    (
        "drop",
        0,
        Command::Adapter(AdapterCommand::Drop),
        "Delete all data of the table",
    ),
    (
        "close",
        0,
        Command::Adapter(AdapterCommand::Close),
        "Detach from the table",
    ),
];

/// Which interactive loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Manager,
    Adapter,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(Mode::Manager),
            "adapter" => Ok(Mode::Adapter),
            other => Err(format!("unknown mode '{}', expected manager or adapter", other)),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum SessionCommand {
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum ManagerCommand {
    /// Create a network and become its first member.
    Create,
    Join,
    Leave,
    ShowConfig,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum AdapterCommand {
    Connect,
    CreateTable,
    LoadTable,
    Put,
    Get,
    TableScan,
    Remove,
    Drop,
    Close,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum Command {
    Session(SessionCommand),
    Manager(ManagerCommand),
    Adapter(AdapterCommand),
}

impl Command {
    fn available_in(&self, mode: Mode) -> bool {
        match self {
            Command::Session(_) => true,
            Command::Manager(_) => mode == Mode::Manager,
            Command::Adapter(_) => mode == Mode::Adapter,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandWithArgs {
    pub command: Command,
    pub args: Vec<String>,
}

/// Splits a line into a command of `mode` and up to its number of arguments.
/// Whatever follows the second to last argument is kept together as the last
/// one, so JSON configs may contain spaces.
pub fn parse_command(mut cmd: String, mode: Mode) -> Option<CommandWithArgs> {
    if cmd.ends_with('\n') {
        cmd.pop();
        if cmd.ends_with('\r') {
            cmd.pop();
        }
    }
    let cmd = cmd.trim();
    let (word, rest) = match cmd.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (cmd, ""),
    };

    let entry = COMMANDS
        .iter()
        .find(|c| c.0 == word && c.2.available_in(mode))?;
    let limit = entry.1 as usize;
    let mut args: Vec<String> = Vec::new();
    if limit > 0 && !rest.is_empty() {
        let mut remaining = rest;
        while args.len() + 1 < limit {
            match remaining.split_once(char::is_whitespace) {
                Some((arg, tail)) => {
                    args.push(arg.to_string());
                    remaining = tail.trim_start();
                }
                None => break,
            }
        }
        if !remaining.is_empty() {
            args.push(remaining.to_string());
        }
    }
    Some(CommandWithArgs {
        command: entry.2.clone(),
        args,
    })
}

pub fn gen_help_string(mode: Mode) -> String {
    let mut help = String::from("Commands:\n");
    for command in COMMANDS.iter().filter(|c| c.2.available_in(mode)) {
        let args = match command.1 {
            0 => "",
            1 => " <arg>",
            _ => " <arg1> <arg2>",
        };
        help.push_str(&format!("  {}{}: {}\n", command.0, args, command.3));
    }
    help
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_create_depends_on_mode() {
        assert_eq!(
            CommandWithArgs {
                command: Command::Manager(ManagerCommand::Create),
                args: vec!["db".to_string()]
            },
            parse_command(String::from("create db\n"), Mode::Manager).unwrap()
        );
        assert_eq!(
            CommandWithArgs {
                command: Command::Adapter(AdapterCommand::CreateTable),
                args: vec!["t".to_string()]
            },
            parse_command(String::from("create t"), Mode::Adapter).unwrap()
        );
    }

    #[test]
    fn test_join_keeps_json_together() {
        let line = String::from(r#"join node2 {"Network": {"id": "db", "network-name": "db"}}"#);
        assert_eq!(
            CommandWithArgs {
                command: Command::Manager(ManagerCommand::Join),
                args: vec![
                    "node2".to_string(),
                    r#"{"Network": {"id": "db", "network-name": "db"}}"#.to_string()
                ]
            },
            parse_command(line, Mode::Manager).unwrap()
        );
    }

    #[test]
    fn test_optional_arguments() {
        let parsed = parse_command(String::from("leave db"), Mode::Manager).unwrap();
        assert_eq!(parsed.args, vec!["db".to_string()]);
        let parsed = parse_command(String::from("load t"), Mode::Adapter).unwrap();
        assert_eq!(parsed.command, Command::Adapter(AdapterCommand::LoadTable));
        assert_eq!(parsed.args, vec!["t".to_string()]);
        let parsed = parse_command(String::from("tablescan\r\n"), Mode::Adapter).unwrap();
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_bad_command() {
        assert_eq!(None, parse_command(String::from("bad\n"), Mode::Manager));
        assert_eq!(None, parse_command(String::from("put k v"), Mode::Manager));
        assert_eq!(None, parse_command(String::from("join a b"), Mode::Adapter));
        assert_eq!(None, parse_command(String::new(), Mode::Adapter));
    }

    #[test]
    fn test_help_lists_mode_commands() {
        let help = gen_help_string(Mode::Adapter);
        assert!(help.contains("tablescan"));
        assert!(help.contains("quit"));
        assert!(!help.contains("join"));
        assert!("ADAPTER".parse::<Mode>().is_ok());
        assert!("server".parse::<Mode>().is_err());
    }
}
