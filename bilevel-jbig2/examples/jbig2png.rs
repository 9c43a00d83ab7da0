//! This example shows you how to convert the pages of a JBIG2 image into PNG
//! files.

#![allow(missing_docs)]

use std::process::ExitCode;

use bilevel_jbig2::{Decoder, Globals, decode_globals};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 3 && args.len() != 4 {
        eprintln!(
            "Usage: {} <input.jb2> <output-prefix> [globals.jb2]",
            args[0]
        );

        return ExitCode::FAILURE;
    }

    let input_path = &args[1];
    let output_prefix = &args[2];

    let data = match std::fs::read(input_path) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Failed to read input file: {err}");

            return ExitCode::FAILURE;
        }
    };

    let globals: Option<Globals> = match args.get(3) {
        Some(path) => {
            let parsed = std::fs::read(path)
                .map_err(|err| err.to_string())
                .and_then(|data| decode_globals(&data).map_err(|err| err.to_string()));

            match parsed {
                Ok(globals) => Some(globals),
                Err(err) => {
                    eprintln!("Failed to load globals: {err}");

                    return ExitCode::FAILURE;
                }
            }
        }
        None => None,
    };

    let mut decoder = match Decoder::new(&data, globals.as_ref()) {
        Ok(decoder) => decoder,
        Err(err) => {
            eprintln!("Failed to parse JBIG2: {err}");

            return ExitCode::FAILURE;
        }
    };

    let mut failed = false;

    for number in decoder.page_numbers() {
        let page = match decoder.decode_page(number) {
            Ok(page) => page,
            Err(err) => {
                eprintln!("Failed to decode page {number}: {err}");
                failed = true;

                continue;
            }
        };

        println!("Decoded page {number}: {}x{} image", page.width, page.height);

        let output_path = format!("{output_prefix}-{number}.png");

        if let Err(err) = page.to_luma_image().save(&output_path) {
            eprintln!("Failed to save PNG: {err}");

            return ExitCode::FAILURE;
        }

        eprintln!("Saved: {output_path}");
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
