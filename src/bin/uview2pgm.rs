// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Instant;
use argh::FromArgs;

use uview_parser::*;
use uview_parser::tags::*;

/** uview2pgm v0.1.0

Dump metadata from UKSOFT2000/UView LEEM/PEEM images and export the pixel plane as 16 bit PGM
*/
#[derive(FromArgs)]
struct Opts {
    /// input file
    #[argh(positional)]
    input: String,

    /// write the pixel plane to this path as a 16 bit binary PGM
    #[argh(option, short = 'o')]
    pgm: Option<String>,

    /// dump all metadata
    #[argh(switch, short = 'd')]
    dump: bool,

    /// print everything as one JSON object instead
    #[argh(switch, short = 'j')]
    json: bool,

    /// print the attached recipe as text
    #[argh(switch, short = 'r')]
    recipe: bool,

    /// hex dump of the raw recipe region
    #[argh(switch, short = 'x')]
    hex: bool,
}

fn main() {
    let opts: Opts = argh::from_env();
    let _time = Instant::now();

    let mut f = filesystem::open_file(&opts.input).unwrap();
    let filename = filesystem::get_filename(&opts.input);

    let buf = util::read_beginning(&mut f.file, f.size, 64).unwrap();
    let mut uview = match UView::detect(&buf, &filename) {
        Some(v) => v,
        None => {
            eprintln!("{}: not a UKSOFT2000/UView file", opts.input);
            std::process::exit(1);
        }
    };
    let image = match uview.parse(&mut f.file, f.size) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Failed to decode {}: {}", opts.input, e);
            std::process::exit(1);
        }
    };

    if opts.json {
        let obj = serde_json::json!({
            "file_header": &image.file_header,
            "image_header": &image.image_header,
            "offsets": &image.offsets,
            "metadata": &image.metadata,
            "tags": &image.tag_map,
            "notes": &image.scan_notes,
        });
        println!("{}", serde_json::to_string_pretty(&obj).unwrap());
    } else {
        println!("Detected: {} revision {}", uview.format_name(), uview.magic_revision.as_deref().unwrap_or("unknown"));
        println!("{: <25}: {}x{} px, {} bpp", "Image", image.width(), image.height(), image.bits_per_pixel());
        println!("{: <25}: {}", "Images in file", image.file_header.image_count);
        if let Some(ts) = image.timestamp() {
            println!("{: <25}: {}", "Acquired", ts);
        }
        if let Some(e) = image.metadata.exposure {
            println!("{: <25}: {} s, averaging {}", "Exposure", e, image.metadata.averaging);
        }
        println!("{: <25}: {} V", "Start voltage", image.metadata.start_voltage);
        println!("{: <25}: {} C", "Sample temperature", image.metadata.temperature);
        println!("{: <25}: {} deg", "Azimuth", image.metadata.azimuth);
        println!("{: <25}: {:e} mbar", "Main chamber pressure", image.metadata.pressure);
        if let (Some(x), Some(y)) = (image.metadata.micrometer_x, image.metadata.micrometer_y) {
            println!("{: <25}: {} x {} um", "Stage", x, y);
        }
        let fov = try_block!(String, {
            image.tag_map.get(&GroupId::Image)?.get_t::<String>(TagId::FieldOfView)?.clone()
        });
        if let Some(fov) = fov {
            println!("{: <25}: {}", "Field of view", fov);
        }
        if image.offsets.divergence() != 0 {
            println!("{: <25}: {} (headers say {})", "Pixel data offset", image.offsets.from_file_length, image.offsets.from_headers);
        }
        for note in &image.scan_notes {
            println!("{: <25}: {}", "Note", note);
        }
        if let Some(e) = &image.tag_stream_error {
            println!("{: <25}: {}", "Warning", e);
        }

        if opts.dump {
            for (group, map) in &image.tag_map {
                for (tagid, taginfo) in map {
                    println!("{: <25} {: <25} {: <50}: {}", format!("{}", group), format!("{}", tagid), taginfo.description, &taginfo.value.to_string());
                }
            }
        }
        if opts.recipe {
            match image.recipe_str() {
                Some(text) => println!("{}", text),
                None => println!("No recipe attached"),
            }
        }
        if opts.hex {
            if let Some(recipe) = &image.recipe {
                println!("{}", pretty_hex::pretty_hex(recipe));
            }
        }
    }

    if let Some(path) = &opts.pgm {
        let plane = image.read_plane(&mut f.file).unwrap();
        let mut out = Vec::with_capacity(plane.len() * 2 + 32);
        out.extend_from_slice(format!("P5\n{} {}\n65535\n", image.width(), image.height()).as_bytes());
        for px in &plane {
            // PGM stores the most significant byte first
            out.extend_from_slice(&px.to_be_bytes());
        }
        std::fs::write(path, out).unwrap();
        println!("Wrote {}x{} px to {}", image.width(), image.height(), path);
    }

    if !opts.json {
        println!("Done in {:.3} ms", _time.elapsed().as_micros() as f64 / 1000.0);
    }
}
