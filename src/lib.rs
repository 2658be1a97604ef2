pub mod cell;
pub mod config;
pub mod device;
pub mod die;
pub mod grid;
pub mod path;
pub mod placement;
pub mod report;
pub mod solver;

use dialoguer::Confirm;
use thiserror::Error;

/// Coordinate scalar, micrometers unless stated otherwise.
pub type Float = f64;
/// GDS layer spec as (layer, datatype).
pub type Layer = (i16, i16);

pub const VER: &str = env!("CARGO_PKG_VERSION");

#[macro_export]
macro_rules! errorln {
    ($literal:literal $(, $args:expr)* $(,)?) => {
        eprintln!(
            concat!("\x1b[31mERROR: ", $literal, "\x1b[0m")
            $(, $args)*
        )
    };
}

#[macro_export]
macro_rules! warnln {
    ($literal:literal $(, $args:expr)* $(,)?) => {
        eprintln!(
            concat!("\x1b[33mWARNING: ", $literal, "\x1b[0m")
            $(, $args)*
        )
    };
}

#[macro_export]
macro_rules! infoln {
    ($literal:literal $(, $args:expr)* $(,)?) => {
        eprintln!(
            concat!("\x1b[32mINFO: ", $literal, "\x1b[0m")
            $(, $args)*
        )
    };
}

#[macro_export]
macro_rules! vprintln {
    ($verbose:expr, $literal:literal $(, $args:expr)* $(,)?) => {
        if $verbose {
            println!($literal $(, $args)*)
        }
    };
}

#[derive(Debug, Error)]
pub enum PicmaskError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Gds(#[from] gds21::GdsError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Prompt(#[from] dialoguer::Error),
    #[error(transparent)]
    Solve(#[from] solver::SolveError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Layout(#[from] cell::LayoutError),
}

/// Default answer for [`query`] when the user just presses enter.
pub enum QueryDefault {
    Yes,
    No,
}

/// Asks a yes/no question on the terminal.
///
/// # Arguments
/// * `message` - The prompt to display
/// * `default` - Answer assumed when the user gives none
pub fn query(message: &str, default: QueryDefault) -> Result<bool, PicmaskError> {
    let default = matches!(default, QueryDefault::Yes);

    let answer = Confirm::new()
        .with_prompt(message)
        .default(default)
        .interact()?;

    Ok(answer)
}
