use midigen::{num::u4, num::u7, EncoderConfig, NoteEvent, PitchClass, Track};
use std::{env, time::Instant};

const SIZES: &[(&str, usize, u32)] = &[
    ("tiny", 1, 16),
    ("song", 3, 400),
    ("long", 3, 20_000),
    ("orchestra", 16, 8_000),
];

/// A benchmarked stage, given the score, its encoded bytes and the encoder settings.
type Stage = fn(&[Track], &[u8], &EncoderConfig) -> Result<usize, String>;

const STAGES: &[(&str, Stage)] = &[
    ("encode", encode),
    ("decode", decode),
];

/// Build `track_count` tracks of `note_count` notes walking up and down the keyboard.
fn score(track_count: usize, note_count: u32) -> Vec<Track> {
    (0..track_count)
        .map(|idx| {
            let notes = (0..note_count)
                .map(|n| {
                    let octave = 2 + (n / 12 % 5) as i32;
                    let class = PitchClass::from_index((n * 7 % 12) as u8);
                    NoteEvent::new(class, octave, 50 + n % 450, u7::new(80))
                })
                .collect();
            Track::new(u4::new(idx as u8), u7::new(idx as u8), notes)
        })
        .collect()
}

fn encode(tracks: &[Track], _bytes: &[u8], config: &EncoderConfig) -> Result<usize, String> {
    let bytes = midigen::encode(tracks, config).map_err(|err| format!("{}", err))?;
    Ok(bytes.len())
}

fn decode(_tracks: &[Track], bytes: &[u8], _config: &EncoderConfig) -> Result<usize, String> {
    let decoded = midigen::try_decode(bytes).map_err(|err| err.chain())?;
    Ok(decoded.notes.len())
}

fn use_stage(stage: Stage, tracks: &[Track], config: &EncoderConfig) -> Result<(), String> {
    let bytes = midigen::encode(tracks, config).map_err(|err| format!("{}", err))?;
    let round = |num: f64| (num * 100.0).round() / 100.0;

    let runtime = || -> Result<_, String> {
        let start = Instant::now();
        let out = stage(tracks, &bytes, config)?;
        let time = round((start.elapsed().as_micros() as f64) / 1000.0);
        Ok((out, time))
    };

    let (output, cold_time) = runtime()?;
    let runtime = || -> Result<_, String> {
        let (out, time) = runtime()?;
        assert_eq!(out, output, "stage is not consistent with its output");
        Ok(time)
    };

    let iters = (2000.0 / cold_time.max(0.01)).floor().min(10_000.0) as u64 + 1;
    let mut total_time = 0.0;
    let mut max_time = cold_time;
    let mut min_time = cold_time;
    for _ in 0..iters {
        let time = runtime()?;
        total_time += time;
        max_time = max_time.max(time);
        min_time = min_time.min(time);
    }
    let avg_time = round(total_time / (iters as f64));

    eprintln!(
        "{} in {} iters / min {}ms / avg {}ms / max {}ms",
        output, iters, min_time, avg_time, max_time
    );

    Ok(())
}

fn main() {
    let size_filter = env::args().nth(1).unwrap_or_default().to_lowercase();
    let stage_filter = env::args().nth(2).unwrap_or_default().to_lowercase();
    let config = EncoderConfig {
        running_status: env::args().nth(3).map_or(false, |arg| arg == "running-status"),
        ..EncoderConfig::default()
    };

    let stages = STAGES
        .iter()
        .filter(|(name, _)| name.contains(&stage_filter))
        .collect::<Vec<_>>();
    if stages.is_empty() {
        eprint!("no stages match the pattern \"{}\", available stages: ", stage_filter);
        for (i, (name, _)) in STAGES.iter().enumerate() {
            if i > 0 {
                eprint!(", ");
            }
            eprint!("{}", name);
        }
        eprintln!();
    }

    for &(name, track_count, note_count) in SIZES.iter().filter(|(name, _, _)| name.contains(&size_filter)) {
        let tracks = score(track_count, note_count);
        eprintln!(
            "score \"{}\" ({} tracks of {} notes)",
            name, track_count, note_count
        );
        for &(stage_name, stage) in stages.iter() {
            eprint!("  {}: ", stage_name);
            if let Err(err) = use_stage(*stage, &tracks, &config) {
                eprintln!("error ({})", err);
            }
        }
        eprintln!();
    }
}
