// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Error
//! The error type for the binary

use crate::error::{ConfigurationError, SelfEnergyError};
use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
pub(crate) enum AppError {
    #[error(transparent)]
    #[diagnostic(code(realspace::io_error))]
    Io(#[from] std::io::Error),
    #[error("failed to read the model description: {0}")]
    #[diagnostic(code(realspace::config_error))]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Logger(#[from] tracing_log::log::SetLoggerError),
    #[error(transparent)]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error(transparent)]
    Model(#[from] ConfigurationError),
    #[error(transparent)]
    SelfEnergy(#[from] SelfEnergyError),
}
