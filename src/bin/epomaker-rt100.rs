/* Copyright (C) 2024 by Sam Rodgers
 *
 * This file is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This file is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this file.  If not, see <http://www.gnu.org/licenses/>.
 */

#[macro_use]
extern crate log;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use epomaker_protocol::commands::{
    Brightness, Dazzle, KeyMap, KeyboardRgbFrame, LightOption, Mode, Profile, Speed,
};
use epomaker_rt100::controller::Controller;
use epomaker_rt100::sensors::{SystemSensors, TelemetrySource, TestSensors};
use epomaker_rt100::{config, keys, logging, sensors, udev, Error, RUNNING};
use std::path::Path;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

/// Frame time for colours set from the command line
const CLI_FRAME_TIME_MS: u8 = 50;

fn cli() -> App<'static, 'static> {
    App::new("epomaker-rt100")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Controller for the Epomaker RT100 keyboard")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("dry-run")
                .long("dry-run")
                .global(true)
                .help("Encode and log every report without opening a device"),
        )
        .subcommand(
            SubCommand::with_name("upload-image")
                .about("Upload an image to the keyboard's LCD")
                .arg(Arg::with_name("IMAGE").required(true).help("Path to the image file")),
        )
        .subcommand(
            SubCommand::with_name("set-rgb-all-keys")
                .about("Set every key to one RGB colour")
                .arg(Arg::with_name("R").required(true))
                .arg(Arg::with_name("G").required(true))
                .arg(Arg::with_name("B").required(true)),
        )
        .subcommand(
            SubCommand::with_name("cycle-light-modes")
                .about("Cycle through the built-in light modes, 5 seconds each"),
        )
        .subcommand(SubCommand::with_name("send-time").about("Send the current time to the LCD"))
        .subcommand(
            SubCommand::with_name("send-temperature")
                .about("Send a temperature readout (0-99 C) to the LCD")
                .arg(Arg::with_name("TEMPERATURE").required(true)),
        )
        .subcommand(
            SubCommand::with_name("send-cpu")
                .about("Send a CPU usage readout (0-99 %) to the LCD")
                .arg(Arg::with_name("CPU").required(true)),
        )
        .subcommand(
            SubCommand::with_name("start-daemon")
                .about("Periodically push time, CPU usage and a temperature to the LCD")
                .arg(Arg::with_name("TEMP_KEY").help("Sensor key to report (see list-temp-devices)"))
                .arg(
                    Arg::with_name("test")
                        .long("test")
                        .help("Push random telemetry instead of reading sensors"),
                ),
        )
        .subcommand(
            SubCommand::with_name("list-temp-devices").about("List available temperature sensors"),
        )
        .subcommand(
            SubCommand::with_name("dev")
                .about("Developer tools")
                .arg(Arg::with_name("print").long("print").help("Print matching HID interfaces"))
                .arg(Arg::with_name("udev").long("udev").help("Generate and install the udev rule")),
        )
        .subcommand(
            SubCommand::with_name("set-keys")
                .about("Set individual keys, e.g. ESC:255,0,0 SPACE:0,255,0")
                .arg(
                    Arg::with_name("ASSIGNMENT")
                        .required(true)
                        .multiple(true)
                        .help("NAME:R,G,B assignments"),
                ),
        )
        .subcommand(
            SubCommand::with_name("remap-keys")
                .about("Remap an internal key index to a USB HID usage code")
                .arg(Arg::with_name("KEY_INDEX").required(true))
                .arg(Arg::with_name("KEY_COMBO").required(true)),
        )
        .subcommand(
            SubCommand::with_name("show-keymap")
                .about("Print the loaded keymap")
                .arg(
                    Arg::with_name("filter")
                        .long("filter")
                        .takes_value(true)
                        .help("Only keys whose name contains this substring"),
                )
                .arg(
                    Arg::with_name("layout")
                        .long("layout")
                        .help("Arrange the keys as the rows of the configured layout"),
                ),
        )
}

fn main() {
    let matches = cli().get_matches();

    // The daemon keeps rotated log files under the config directory; one-shot
    // commands only log to stderr
    let logging_result = if matches.subcommand_matches("start-daemon").is_some() {
        logging::setup_logging()
    } else {
        logging::setup_logging_lite()
    };
    if let Err(e) = logging_result {
        eprintln!("Logging setup failed: {}", e);
    }

    // Close the device cleanly on SIGINT/SIGTERM; send loops poll this flag
    let r = RUNNING.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting signal handler");

    if let Err(e) = run(&matches) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    let config = config::load_main_config()?;
    let dry_run = matches.is_present("dry-run");

    match matches.subcommand() {
        ("upload-image", Some(sub)) => {
            let image = required(sub, "IMAGE")?;
            let mut controller = Controller::open(config, dry_run)?;
            println!("Uploading, you should see the progress on the keyboard screen");
            controller.send_image(Path::new(image))?;
            println!("Image uploaded successfully.");
            controller.close();
            Ok(())
        }
        ("set-rgb-all-keys", Some(sub)) => {
            let r = parse_byte(required(sub, "R")?, "R")?;
            let g = parse_byte(required(sub, "G")?, "G")?;
            let b = parse_byte(required(sub, "B")?, "B")?;
            let mut controller = Controller::open(config, dry_run)?;
            controller.set_rgb_all_keys(r, g, b)?;
            println!("All keys set to RGB({}, {}, {}).", r, g, b);
            controller.close();
            Ok(())
        }
        ("cycle-light-modes", _) => cycle_light_modes(config, dry_run),
        ("send-time", _) => {
            let mut controller = Controller::open(config, dry_run)?;
            controller.send_time_now()?;
            println!("Time sent successfully.");
            controller.close();
            Ok(())
        }
        ("send-temperature", Some(sub)) => {
            let celsius = parse_byte(required(sub, "TEMPERATURE")?, "temperature")?;
            let mut controller = Controller::open(config, dry_run)?;
            controller.send_temperature(celsius)?;
            println!("Temperature sent successfully.");
            controller.close();
            Ok(())
        }
        ("send-cpu", Some(sub)) => {
            let percent = parse_byte(required(sub, "CPU")?, "cpu percentage")?;
            let mut controller = Controller::open(config, dry_run)?;
            controller.send_cpu(percent)?;
            println!("CPU usage sent successfully.");
            controller.close();
            Ok(())
        }
        ("start-daemon", Some(sub)) => {
            let temp_key = sub.value_of("TEMP_KEY");
            let test_mode = sub.is_present("test");
            info!("Starting daemon (temp key: {:?}, test mode: {})", temp_key, test_mode);

            let source: Box<dyn TelemetrySource> = if test_mode {
                Box::new(TestSensors)
            } else {
                Box::new(SystemSensors)
            };
            let mut controller = Controller::open(config, dry_run)?;
            controller.start_daemon(source.as_ref(), temp_key)
        }
        ("list-temp-devices", _) => {
            sensors::print_temperature_sensors();
            Ok(())
        }
        ("dev", Some(sub)) => dev_tools(&config, sub),
        ("set-keys", Some(sub)) => set_keys(config, dry_run, sub),
        ("remap-keys", Some(sub)) => {
            let key_index = parse_byte(required(sub, "KEY_INDEX")?, "key index")?;
            let key_combo = parse_byte(required(sub, "KEY_COMBO")?, "key combo")?;
            let mut controller = Controller::open(config, dry_run)?;
            controller.remap_key(key_index, key_combo)?;
            println!("Remapped key {} to HID code {:#04x}.", key_index, key_combo);
            controller.close();
            Ok(())
        }
        ("show-keymap", Some(sub)) => show_keymap(&config, sub),
        _ => unreachable!("subcommand is required"),
    }
}

fn cycle_light_modes(config: config::MainConfig, dry_run: bool) -> Result<(), Error> {
    let mut controller = Controller::open(config, dry_run)?;
    println!("Cycling through {} modes, waiting 5 seconds on each", Mode::ALL.len());

    for (counter, mode) in Mode::ALL.iter().enumerate() {
        if !RUNNING.load(Ordering::SeqCst) {
            break;
        }
        let profile = Profile {
            mode: *mode,
            speed: Speed::DEFAULT,
            brightness: Brightness::DEFAULT,
            dazzle: Dazzle::Off,
            option: LightOption::OFF,
            rgb: (180, 180, 180),
        };
        controller.set_profile(&profile)?;
        println!("[{}/{}] Cycled to light mode: {:?}", counter + 1, Mode::ALL.len(), mode);
        thread::sleep(Duration::from_secs(5));
    }

    controller.close();
    println!("Cycled through all light modes.");
    Ok(())
}

fn set_keys(config: config::MainConfig, dry_run: bool, sub: &ArgMatches) -> Result<(), Error> {
    let assignments = sub
        .values_of("ASSIGNMENT")
        .ok_or_else(|| Error::Config("no key assignments given".to_string()))?;

    let mut controller = Controller::open(config, dry_run)?;
    let mut key_map = KeyMap::new();
    let mut count = 0;
    for assignment in assignments {
        let (name, rgb) = parse_assignment(assignment)?;
        let value = controller.keys().get(name)?.value;
        key_map.set(value, rgb)?;
        count += 1;
    }

    let frames = [KeyboardRgbFrame::new(key_map, CLI_FRAME_TIME_MS, 0)];
    controller.send_key_frames(&frames)?;
    println!("Set {} key(s).", count);
    controller.close();
    Ok(())
}

fn dev_tools(config: &config::MainConfig, sub: &ArgMatches) -> Result<(), Error> {
    if sub.is_present("print") {
        let interfaces = epomaker_rt100::device::list_interfaces(config)?;
        if interfaces.is_empty() {
            println!("No matching HID interfaces found.");
        }
        for line in interfaces {
            println!("{}", line);
        }
        return Ok(());
    }

    if sub.is_present("udev") {
        print!("{}", udev::generate_rules(config));
        match udev::install_rules(config) {
            Ok(path) => {
                println!("Installed {:?}.", path);
                println!("Reload with `udevadm control --reload` and replug the keyboard.");
            }
            Err(e) => {
                println!("Could not install {:?} ({}).", udev::RULE_FILE_PATH, e);
                println!("Write the rules above there manually (root required).");
            }
        }
        return Ok(());
    }

    println!("No dev tool specified (try --print or --udev).");
    Ok(())
}

fn show_keymap(config: &config::MainConfig, sub: &ArgMatches) -> Result<(), Error> {
    let table = keys::KeyboardKeys::load(Path::new(&config.conf_keymap_path))?;
    if sub.is_present("layout") {
        return show_layout(config, &table);
    }

    let filter = sub.value_of("filter").map(str::to_lowercase);
    println!("{:<20} {:>5}  DISPLAY", "NAME", "INDEX");
    for key in table.iter() {
        if let Some(filter) = &filter {
            if !key.name.to_lowercase().contains(filter) {
                continue;
            }
        }
        println!("{:<20} {:>5}  {}", key.name, key.value, key.display());
    }
    Ok(())
}

/// Print the physical key arrangement, one terminal line per layout row
fn show_layout(config: &config::MainConfig, table: &keys::KeyboardKeys) -> Result<(), Error> {
    let layout = config::load_layout(Path::new(&config.conf_layout_path))?;

    for row in layout {
        let mut line = String::new();
        for entry in row {
            match entry {
                config::LayoutEntry::Key(name) => {
                    // A layout may name keys this keymap does not carry;
                    // show the raw name rather than failing the whole print
                    let label = match table.get(&name) {
                        Ok(key) => key.display().to_string(),
                        Err(_) => format!("{}?", name),
                    };
                    line += &format!("{:>7}", label);
                }
                // Geometry entries size the following key; only the GUI
                // cares about pixel dimensions
                config::LayoutEntry::Geometry(_) => {}
            }
        }
        println!("{}", line.trim_start());
    }
    Ok(())
}

/// Required positional argument, by name
fn required<'a>(sub: &'a ArgMatches, name: &str) -> Result<&'a str, Error> {
    sub.value_of(name)
        .ok_or_else(|| Error::Config(format!("missing argument {}", name)))
}

/// Parse a byte, accepting decimal or 0x-prefixed hex
fn parse_byte(value: &str, what: &str) -> Result<u8, Error> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|_| Error::Config(format!("invalid {}: {:?}", what, value)))
}

/// Parse a `NAME:R,G,B` assignment
fn parse_assignment(assignment: &str) -> Result<(&str, (u8, u8, u8)), Error> {
    let (name, colour) = assignment
        .split_once(':')
        .ok_or_else(|| Error::Config(format!("expected NAME:R,G,B, got {:?}", assignment)))?;

    let mut parts = colour.split(',');
    let mut next = |what: &str| -> Result<u8, Error> {
        let part = parts
            .next()
            .ok_or_else(|| Error::Config(format!("expected NAME:R,G,B, got {:?}", assignment)))?;
        parse_byte(part.trim(), what)
    };
    let rgb = (next("R")?, next("G")?, next("B")?);

    if parts.next().is_some() {
        return Err(Error::Config(format!("expected NAME:R,G,B, got {:?}", assignment)));
    }
    Ok((name, rgb))
}
