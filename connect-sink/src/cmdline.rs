use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use connect_sink_core::{Error, Result};

use crate::properties;

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_DEAD_LETTER_CAPACITY: usize = 1000;

pub(crate) fn root_cli() -> Command {
    Command::new("connect-sink")
        .about("Reads JSON-lines records from stdin and writes them through a sink task")
        .version(connect_sink_core::version())
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Connector properties file (key=value per line)"),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .help("Override a connector property, may be repeated"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_parser(value_parser!(usize))
                .default_value("500")
                .help("Maximum number of records per batch"),
        )
        .arg(
            Arg::new("dead-letter-capacity")
                .long("dead-letter-capacity")
                .value_parser(value_parser!(usize))
                .default_value("1000")
                .help("Capacity of the dead-letter channel"),
        )
        .arg(
            Arg::new("print-statistics")
                .long("print-statistics")
                .action(ArgAction::SetTrue)
                .help("Print the task statistics to stdout before exiting"),
        )
}

/// Runner settings resolved from the command line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Settings {
    pub(crate) props: HashMap<String, String>,
    pub(crate) batch_size: usize,
    pub(crate) dead_letter_capacity: usize,
    pub(crate) print_statistics: bool,
}

impl Settings {
    pub(crate) fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let mut props = match matches.get_one::<PathBuf>("config") {
            Some(path) => properties::load(path)?,
            None => HashMap::new(),
        };

        for pair in matches.get_many::<String>("set").into_iter().flatten() {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("Invalid --set {pair:?}, expected KEY=VALUE")))?;
            props.insert(key.trim().to_string(), value.trim().to_string());
        }

        let batch_size = matches
            .get_one::<usize>("batch-size")
            .copied()
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(Error::Config("--batch-size must be greater than 0".to_string()));
        }

        let dead_letter_capacity = matches
            .get_one::<usize>("dead-letter-capacity")
            .copied()
            .unwrap_or(DEFAULT_DEAD_LETTER_CAPACITY)
            .max(1);

        Ok(Settings {
            props,
            batch_size,
            dead_letter_capacity,
            print_statistics: matches.get_flag("print-statistics"),
        })
    }
}
