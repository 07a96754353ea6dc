// Stria
// Copyright (c) 2023 The Project Stria Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A thin command line scanner over the Stria framework: load an image, decode, print.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error};

use stria::core::errors::Error;
use stria::core::format::FormatSet;
use stria::core::luma::GreyImage;
use stria::core::options::DecodeOptions;

const EXIT_NOT_FOUND: u8 = 1;
const EXIT_CHECKSUM: u8 = 2;
const EXIT_INVALID_INPUT: u8 = 3;

#[derive(Parser)]
#[command(name = "stria-scan", version, about = "Decode a barcode from an image file")]
struct Args {
    /// Image file to scan.
    image: PathBuf,

    /// Spend more time looking for a symbol (scan every row, retry reversed).
    #[arg(long)]
    try_harder: bool,

    /// Restrict decoding to a symbology family: qr, product, industrial.
    #[arg(long)]
    formats: Option<String>,

    /// Assume this character set for undeclared byte segments.
    #[arg(long)]
    charset: Option<String>,

    /// Print the parsed interpretation instead of the raw text.
    #[arg(long)]
    parse: bool,
}

fn main() -> ExitCode {
    pretty_env_logger::init();

    let args = Args::parse();

    let formats = match args.formats.as_deref() {
        None => None,
        Some("qr") => Some(FormatSet::QR_CODE),
        Some("product") => Some(FormatSet::PRODUCT_1D),
        Some("industrial") => Some(FormatSet::INDUSTRIAL_1D),
        Some(other) => {
            error!("unknown format family '{}'", other);
            return ExitCode::from(EXIT_INVALID_INPUT);
        }
    };

    let luma = match image::open(&args.image) {
        Ok(image) => image.to_luma8(),
        Err(err) => {
            error!("cannot load {}: {}", args.image.display(), err);
            return ExitCode::from(EXIT_INVALID_INPUT);
        }
    };

    let (width, height) = luma.dimensions();
    let source = match GreyImage::new(width as usize, height as usize, luma.into_raw()) {
        Ok(source) => source,
        Err(err) => {
            error!("cannot adapt image: {}", err);
            return ExitCode::from(EXIT_INVALID_INPUT);
        }
    };

    let options = DecodeOptions {
        try_harder: args.try_harder,
        formats,
        character_set: args.charset,
        strict_terminator: false,
    };

    match stria::decode(Box::new(source), &options) {
        Ok(reading) => {
            debug!("decoded {} at {} points", reading.format, reading.points.len());

            if args.parse {
                println!("{:?}", stria::parse(&reading));
            }
            else {
                println!("{}", reading.text());
            }
            ExitCode::SUCCESS
        }
        Err(Error::NotFound) => {
            error!("no barcode found");
            ExitCode::from(EXIT_NOT_FOUND)
        }
        Err(err @ (Error::ChecksumError(_) | Error::FormatError(_))) => {
            error!("symbol found but undecodable: {}", err);
            ExitCode::from(EXIT_CHECKSUM)
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::from(EXIT_INVALID_INPUT)
        }
    }
}
