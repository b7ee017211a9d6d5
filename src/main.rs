//! Headless badge harness
//!
//! Drives the PSG engine and the double-buffered video pipeline with the
//! same timing the emulator core uses (262 scanlines of 228 CPU cycles per
//! frame), feeding a scripted register stream and a scrolling test pattern.

use std::env;
use std::time::Instant;

use anyhow::{bail, Context};
use sms_badge::psg::registers::{latch_byte, tone_bytes, LatchType};
use sms_badge::video::{double_buffered, CountingTransport, VideoTransmitter};
use sms_badge::{ApuSample, AudioSink, BadgeConfig, PsgConfig, PsgEngine, VideoBuffer};

const CYCLES_PER_LINE: u32 = 228;
const LINES_PER_FRAME: u16 = 262;
const STATS_INTERVAL_FRAMES: u64 = 60;
const FRAMES_PER_NOTE: u64 = 15;

/// C major scale as tone periods at the NTSC clock
const SCALE: [u16; 8] = [428, 381, 339, 320, 285, 254, 226, 214];

/// RGB565 colour bars
const BARS: [u16; 8] = [
    0xFFFF, 0xFFE0, 0x07FF, 0x07E0, 0xF81F, 0xF800, 0x001F, 0x0000,
];

struct Options {
    config: Option<String>,
    frames: u64,
    wav: Option<String>,
    inline: bool,
}

fn usage() {
    eprintln!(
        "Usage:\n  sms-badge [--config <file.json>] [--frames <n>] [--wav <out.wav>] [--inline]\n\nFlags:\n  --config <file>   Load PSG/video settings from JSON\n  --frames <n>      Number of frames to run (default 600)\n  --wav <file>      Record the PSG output\n  --inline          Run PSG syncs on the emulation thread\n  -h, --help        Show this help"
    );
}

fn parse_args() -> anyhow::Result<Option<Options>> {
    let mut options = Options {
        config: None,
        frames: 600,
        wav: None,
        inline: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => options.config = Some(args.next().context("--config requires a path")?),
            "--wav" => options.wav = Some(args.next().context("--wav requires a path")?),
            "--frames" => {
                let value = args.next().context("--frames requires a number")?;
                options.frames = value
                    .parse()
                    .with_context(|| format!("Invalid frame count '{value}'"))?;
            }
            "--inline" => options.inline = true,
            "--help" | "-h" => {
                usage();
                return Ok(None);
            }
            _ => {
                usage();
                bail!("Unknown argument: {arg}");
            }
        }
    }
    Ok(Some(options))
}

fn start_engine<S: AudioSink + 'static>(
    config: PsgConfig,
    sink: S,
    inline: bool,
) -> sms_badge::Result<PsgEngine> {
    if inline {
        PsgEngine::inline(config, sink)
    } else {
        PsgEngine::spawn(config, sink)
    }
}

/// Register bytes for the start of `frame`
fn script(frame: u64) -> Vec<u8> {
    if frame == 0 {
        return vec![
            latch_byte(0, LatchType::Volume, 0x2),
            latch_byte(1, LatchType::Volume, 0xF),
            latch_byte(2, LatchType::Volume, 0xF),
            latch_byte(3, LatchType::Volume, 0xF),
        ];
    }
    if frame % FRAMES_PER_NOTE != 0 {
        return Vec::new();
    }

    let note = (frame / FRAMES_PER_NOTE) as usize;
    let mut bytes = tone_bytes(0, SCALE[note % SCALE.len()]).to_vec();
    if note % 4 == 0 {
        // White noise hit, fastest rate
        bytes.push(latch_byte(3, LatchType::Tone, 0x4));
        bytes.push(latch_byte(3, LatchType::Volume, 0x4));
    } else {
        bytes.push(latch_byte(3, LatchType::Volume, 0xF));
    }
    bytes
}

fn render_line(buffer: &mut VideoBuffer, y: u16, frame: u64, line: &mut Vec<u16>) -> sms_badge::Result<()> {
    let width = usize::from(buffer.width());
    let bar_width = (width / BARS.len()).max(1);
    line.clear();
    line.extend((0..width).map(|x| {
        let shifted = (x + frame as usize + usize::from(y) / 8) % width;
        BARS[(shifted / bar_width) % BARS.len()]
    }));
    buffer.write_line(y, line)
}

fn run(options: Options) -> anyhow::Result<()> {
    let config = match &options.config {
        Some(path) => BadgeConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration '{path}'"))?,
        None => BadgeConfig::default(),
    };
    log::info!(
        "PSG at {} Hz (callback every {} cycles), video {}x{} in {} parts",
        config.psg.sample_rate,
        config.psg.callback_period(),
        config.video.width,
        config.video.height,
        config.video.part_count
    );

    let wav = match &options.wav {
        Some(path) => Some(
            sms_badge::WavSink::create(path, config.psg.sample_rate)
                .with_context(|| format!("Failed to create '{path}'"))?,
        ),
        None => None,
    };
    let engine = match &wav {
        Some(sink) => start_engine(config.psg, sink.clone(), options.inline)?,
        None => start_engine(config.psg, |_: ApuSample| {}, options.inline)?,
    };

    let (mut presenter, receiver) = double_buffered(&config.video)?;
    let transport = CountingTransport::new();
    let transmitter = VideoTransmitter::spawn(receiver, transport.clone())?;
    let stats = presenter.stats();

    let height = config.video.height;
    let vblank_line = height.min(LINES_PER_FRAME - 1);
    let mut line = Vec::with_capacity(usize::from(config.video.width));
    let started = Instant::now();

    for frame in 0..options.frames {
        for byte in script(frame) {
            engine.write_register(byte);
        }
        engine.request_sync();

        for y in 0..LINES_PER_FRAME {
            engine.advance(CYCLES_PER_LINE);
            if y < height {
                render_line(&mut presenter.drawable(), y, frame, &mut line)?;
            }
            if y == vblank_line {
                presenter.present();
            }
            engine.request_sync();
        }

        if (frame + 1) % STATS_INTERVAL_FRAMES == 0 {
            let report = stats.take();
            log::info!(
                "frames: {}, dropped: {}, succeeded: {}, register writes dropped: {}",
                report.frames,
                report.dropped,
                report.succeeded(),
                engine.dropped_writes()
            );
        }
    }

    engine.sync_now();
    let callbacks = engine.callbacks_fired();
    drop(engine);
    drop(presenter);
    let transmitted = transmitter.transmitted_frames();
    drop(transmitter);

    if let Some(sink) = wav {
        sink.finalize().context("Failed to finalize WAV output")?;
        log::info!("Wrote {} samples", sink.samples_written());
    }

    log::info!(
        "Ran {} frames in {:.2?}: {} audio callbacks, {} frames transmitted ({} bytes in {} transfers)",
        options.frames,
        started.elapsed(),
        callbacks,
        transmitted,
        transport.bytes(),
        transport.transfers()
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match parse_args()? {
        Some(options) => run(options),
        None => Ok(()),
    }
}
