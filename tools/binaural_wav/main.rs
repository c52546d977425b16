use anyhow::{bail, Context, Result};
use binaural_masking::dsp::utils::{frame_rms, gain_to_db};
use binaural_masking::{BinauralConfig, BinauralMasking, MaskingMethod, StreamingHost};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::PathBuf;

fn usage() -> ! {
    let defaults = BinauralConfig::default();
    eprintln!("usage: binaural_wav <input.wav> <output.wav> [mic_distance_m] [method]");
    eprintln!();
    eprintln!("  mic_distance_m  default {}", defaults.microphone_distance);
    eprintln!("  method          default {}", defaults.method.name());
    eprintln!();
    eprintln!("masking methods:");
    for m in [MaskingMethod::Factor, MaskingMethod::Relative, MaskingMethod::Full] {
        eprintln!("  {:<9} {}", m.name(), m.description());
    }
    std::process::exit(2);
}

fn read_stereo(path: &PathBuf) -> Result<(u32, Vec<f32>, Vec<f32>)> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open input WAV '{}'", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 2 {
        bail!(
            "binaural masking needs a stereo file, '{}' has {} channels",
            path.display(),
            spec.channels
        );
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Int, 24) => reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_607.0))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (fmt, bits) => bail!("unsupported sample format {:?} / {} bits", fmt, bits),
    };

    let left = interleaved.iter().step_by(2).copied().collect();
    let right = interleaved.iter().skip(1).step_by(2).copied().collect();
    Ok((spec.sample_rate, left, right))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let (Some(input), Some(output)) = (args.next(), args.next()) else {
        usage();
    };
    let input = PathBuf::from(input);
    let output = PathBuf::from(output);

    let mut config = BinauralConfig::default();
    if let Some(distance) = args.next() {
        config.microphone_distance = distance
            .parse::<f32>()
            .with_context(|| format!("invalid microphone distance '{}'", distance))?;
    }
    if let Some(name) = args.next() {
        let Some(method) = MaskingMethod::from_name(&name) else {
            bail!("unknown masking method '{}' (expected factor, relative or full)", name);
        };
        config.method = method;
    }
    if args.next().is_some() {
        usage();
    }

    let (sample_rate, mut left, mut right) = read_stereo(&input)?;
    config.sample_rate = sample_rate;
    config.high_freq = config.high_freq.min(sample_rate as f32 / 2.0);
    let method = config.method;

    let stage = BinauralMasking::from_config(config).context("failed to build masking stage")?;
    let mut host = StreamingHost::new(stage);
    let latency = host.latency();

    let in_rms = 0.5 * (frame_rms(&left) + frame_rms(&right));

    // Flush the window latency so the output lines up with the input.
    let len = left.len();
    left.resize(len + latency, 0.0);
    right.resize(len + latency, 0.0);
    host.process_block(&mut left, &mut right);

    let out_l = &left[latency..];
    let out_r = &right[latency..];
    let out_rms = 0.5 * (frame_rms(out_l) + frame_rms(out_r));

    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&output, spec)
        .with_context(|| format!("failed to create output WAV '{}'", output.display()))?;
    for (l, r) in out_l.iter().zip(out_r) {
        writer.write_sample(*l)?;
        writer.write_sample(*r)?;
    }
    writer.finalize()?;

    println!("Binaural masking summary for '{}':", input.display());
    println!("  samples processed : {}", len);
    println!("  method            : {} ({})", method.name(), method.code());
    println!("  window / hop      : {} / {}", latency, host.hop_size());
    println!("  input rms         : {:.6}", in_rms);
    println!("  output rms        : {:.6}", out_rms);
    println!("  level change      : {:+.2} dB", gain_to_db(out_rms / in_rms.max(1e-12)));
    println!("  failed frames     : {}", host.failed_frames());
    println!("  written to        : {}", output.display());
    Ok(())
}
