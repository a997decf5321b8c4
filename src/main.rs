//! Main Program for Tilemend
//! Run with `--help` for more instruction

// Copyright (C) 2023 Dheatly23
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Error};
use clap::{Parser, Subcommand};
use image::ImageReader;
use rayon::prelude::*;
use tilemend::scramble::{scramble_to_bytes, seeded_rng};
use tilemend::{
    DescramblingEngine, EngineConfig, GridPlan, ImageMetadata, OutputFormat, PermutationKey,
    SchemeParameters,
};

#[derive(Parser, Debug)]
#[command(author, version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reassemble scrambled images
    Descramble {
        /// Input files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory
        #[arg(short = 'o', long)]
        output: PathBuf,

        /// Write JPEG at this quality instead of PNG
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        jpeg_quality: Option<u8>,
    },

    /// Scramble an image and embed the key, for testing
    Scramble {
        /// Input file
        input: PathBuf,

        /// Random seed
        #[arg(long)]
        seed: Option<String>,

        /// Write JPEG at this quality instead of PNG
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        jpeg_quality: Option<u8>,

        /// Output file
        #[arg(short = 'o', long)]
        output: PathBuf,
    },

    /// Print the metadata and grid of a scrambled image
    Inspect {
        /// Input file
        input: PathBuf,
    },
}

fn output_format(jpeg_quality: Option<u8>) -> OutputFormat {
    match jpeg_quality {
        Some(quality) => OutputFormat::Jpeg { quality },
        None => OutputFormat::Png,
    }
}

fn descramble(inputs: &[PathBuf], output: &Path, jpeg_quality: Option<u8>) -> Result<(), Error> {
    fs::create_dir_all(output)?;
    let config = EngineConfig::builder()
        .output(output_format(jpeg_quality))
        .build();
    let engine = DescramblingEngine::new(config);

    let failed = inputs
        .par_iter()
        .filter_map(|input| {
            let res = (|| -> Result<(), Error> {
                let out = engine.descramble(fs::read(input)?)?;
                for w in &out.warnings {
                    log::warn!("{}: {w}", input.display());
                }

                let name = input.file_stem().context("Input has no file name")?;
                let path = output.join(format!(
                    "{}.{}",
                    name.to_string_lossy(),
                    out.format.extension()
                ));
                fs::write(&path, &out.bytes)?;
                log::info!("{} -> {}", input.display(), path.display());
                Ok(())
            })();

            res.map_err(|e| log::error!("{}: {e:#}", input.display()))
                .err()
        })
        .count();

    if failed > 0 {
        bail!("{failed} of {} images failed", inputs.len());
    }
    Ok(())
}

fn scramble(
    input: &Path,
    seed: Option<&str>,
    jpeg_quality: Option<u8>,
    output: &Path,
) -> Result<(), Error> {
    let scheme = SchemeParameters::default();
    let im = ImageReader::new(BufReader::new(File::open(input)?))
        .with_guessed_format()?
        .decode()?
        .into_rgba8();

    let key = PermutationKey::random(scheme.expected_key_len(), &mut seeded_rng(seed));
    let bytes = scramble_to_bytes(&im, &key, &scheme, output_format(jpeg_quality))?;
    fs::write(output, bytes)?;

    println!("{key}");
    Ok(())
}

fn inspect(input: &Path) -> Result<(), Error> {
    let scheme = SchemeParameters::default();
    let meta = ImageMetadata::read(BufReader::new(File::open(input)?), &scheme)?;
    let (w, h) = image::image_dimensions(input)?;
    let plan = GridPlan::new((w, h), (meta.width, meta.height), &scheme);

    println!("raster:     {w}x{h}");
    println!(
        "metadata:   {}x{} ({:?})",
        meta.width, meta.height, meta.source
    );
    println!("canvas:     {}x{}", plan.canvas_width, plan.canvas_height);
    println!("block:      {}x{}", plan.block_width, plan.block_height);
    match meta.key() {
        Ok(key) => println!(
            "key:        {} entries (expected {})",
            key.len(),
            scheme.expected_key_len()
        ),
        Err(e) => println!("key:        {e}"),
    }
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Descramble {
            inputs,
            output,
            jpeg_quality,
        } => descramble(&inputs, &output, jpeg_quality),
        Command::Scramble {
            input,
            seed,
            jpeg_quality,
            output,
        } => scramble(&input, seed.as_deref(), jpeg_quality, &output),
        Command::Inspect { input } => inspect(&input),
    }
}
