use midigen::EncoderConfig;
use std::{
    env,
    error::Error,
    fs,
    io::{self, Read, Write},
    process,
};

/// Path to a JSON encoder configuration, read if set.
const CONFIG_VAR: &str = "MIDIGEN_CONFIG";

const COMMANDS: &[(&str, &str, fn(&[String]) -> Result<(), Box<dyn Error>>)] = &[
    ("encode", "<input|-> [out.mid]", encode),
    ("uri", "<input|->", uri),
    ("decode", "<file.mid|data-uri>", decode),
];

/// Read the generator output from a file, or from stdin if the path is `-`.
fn read_input(path: &str) -> Result<String, Box<dyn Error>> {
    if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn load_config() -> Result<EncoderConfig, Box<dyn Error>> {
    match env::var(CONFIG_VAR) {
        Ok(path) => {
            log::debug!("loading encoder config from \"{}\"", path);
            Ok(EncoderConfig::from_json(&fs::read_to_string(path)?)?)
        }
        Err(_) => Ok(EncoderConfig::default()),
    }
}

fn encode_input(args: &[String]) -> Result<Vec<u8>, Box<dyn Error>> {
    let input = args.get(0).ok_or("missing input path")?;
    let config = load_config()?;
    let score = midigen::validate(&read_input(input)?)?;
    Ok(midigen::encode_score(&score, &config)?)
}

fn encode(args: &[String]) -> Result<(), Box<dyn Error>> {
    let bytes = encode_input(args)?;
    match args.get(1) {
        Some(out) => {
            fs::write(out, &bytes)?;
            eprintln!("wrote {} bytes to \"{}\"", bytes.len(), out);
        }
        None => io::stdout().write_all(&bytes)?,
    }
    Ok(())
}

fn uri(args: &[String]) -> Result<(), Box<dyn Error>> {
    let bytes = encode_input(args)?;
    println!("{}", midigen::to_data_uri(&bytes));
    Ok(())
}

fn decode(args: &[String]) -> Result<(), Box<dyn Error>> {
    let input = args.get(0).ok_or("missing midi file")?;
    let decoded = if input.starts_with("data:") {
        midigen::try_decode_data_uri(input)?
    } else {
        midigen::try_decode(&fs::read(input)?)?
    };
    eprintln!(
        "{:?} file, {} tracks, {} ticks per beat, {} notes over {} beats",
        decoded.format,
        decoded.track_count,
        decoded.division,
        decoded.notes.len(),
        decoded.total_beats(),
    );
    for tempo in decoded.tempo_changes.iter() {
        eprintln!("  tempo {} bpm at beat {}", tempo.bpm(), tempo.beat);
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for note in decoded.notes.iter() {
        writeln!(
            out,
            "{}{}\tstart {}\tduration {}\tchannel {}\tvelocity {}",
            note.pitch_class, note.octave, note.start, note.duration, note.channel, note.velocity
        )?;
    }
    Ok(())
}

fn usage() {
    eprintln!("usage:");
    for (name, args, _) in COMMANDS.iter() {
        eprintln!("  midigen {} {}", name, args);
    }
    eprintln!("set {} to a json file to configure the encoder", CONFIG_VAR);
}

fn main() {
    env_logger::init();
    let args = env::args().skip(1).collect::<Vec<_>>();
    let name = args.get(0).map(String::as_str).unwrap_or_default();
    let command = COMMANDS.iter().find(|(cmd, _, _)| *cmd == name);
    match command {
        Some((_, _, run)) => {
            if let Err(err) = run(&args[1..]) {
                eprintln!("error: {}", err);
                process::exit(1);
            }
        }
        None => {
            if !name.is_empty() {
                eprintln!("unknown command \"{}\"", name);
            }
            usage();
            process::exit(2);
        }
    }
}
