// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// This module drives a real-space calculation from the command line
mod configuration;
mod error;
mod telemetry;

pub(crate) use configuration::Configuration;

use crate::{
    self_energy::RealSpaceSelfEnergyBuilder,
    spectral::EnergySpaceBuilder,
};
use clap::{ArgEnum, Parser};
use num_complex::Complex;
use std::{fmt, path::PathBuf};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct App {
    /// The `.toml` model description
    file_path: PathBuf,
    #[clap(arg_enum, short, long, default_value = "info")]
    log_level: LogLevel,
    /// Directory receiving the json log
    #[clap(long, default_value = "results")]
    log_directory: PathBuf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{level}")
    }
}

/// Prints the density of states `-Im Tr G / π` of the configured region at each energy
pub fn run() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = App::parse();

    let (subscriber, _guard) = telemetry::get_subscriber(cli.log_level, &cli.log_directory);
    telemetry::init_subscriber(subscriber)?;

    let configuration = Configuration::build(&cli.file_path)?;
    let operator = configuration.model.build_operator()?;
    tracing::info!(
        "Model with {} orbitals and {} stored elements",
        operator.num_orbitals(),
        operator.nnz()
    );

    let region = &configuration.region;
    let mut calculator = RealSpaceSelfEnergyBuilder::new()
        .with_parent(&operator)
        .with_semi_axis(region.semi_axis)
        .with_k_axes(&region.k_axes)
        .with_unfold(region.unfold)
        .with_options(configuration.options.clone())
        .build()?;
    calculator.initialize()?;

    let spectral = &configuration.spectral;
    let energies = EnergySpaceBuilder::new()
        .with_number_of_points(spectral.number_of_energy_points)
        .with_energy_range(spectral.minimum_energy..spectral.maximum_energy)
        .build()?;

    let term = console::Term::stdout();
    term.write_line(&format!("{:>14} {:>18}", "energy", "dos"))?;
    for &energy in energies.points() {
        let green = calculator.green(Complex::from(energy), &[0.; 3])?;
        let dos = -green.trace().im / std::f64::consts::PI;
        term.write_line(&format!("{energy:>14.6} {dos:>18.8e}"))?;
    }
    Ok(())
}
