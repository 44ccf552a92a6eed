//! Subcommand handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use bytes::Bytes;
use futures::StreamExt;
use infrastructure::AppConfig;
use speech_dispatch::{
    AudioData, AudioFormat, AudioStream, CancellationToken, SpeechError, SynthesisRequest,
    TranscriptEvent, TranscriptionMode, TranscriptionRequest, TranscriptionResult, VoiceService,
};

/// Arguments for `speak`
#[derive(Debug)]
pub struct SpeakArgs {
    pub text: String,
    pub profile: String,
    pub out: Option<PathBuf>,
    pub provider: Option<String>,
    pub repeat: u32,
    pub prime: bool,
}

/// Arguments for `transcribe`
#[derive(Debug)]
pub struct TranscribeArgs {
    pub file: PathBuf,
    pub mode: TranscriptionMode,
    pub language: Option<String>,
    pub provider: Option<String>,
    pub sample_rate: u32,
    pub chunk_bytes: usize,
}

pub fn providers(service: &VoiceService, json: bool) -> anyhow::Result<()> {
    let health = service.health();

    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
        return Ok(());
    }

    println!("🔌 Registered providers:");
    for record in service.registry().providers() {
        println!("   {} [{}]", record.id(), record.capabilities());
        for snapshot in health.iter().filter(|h| &h.provider == record.id()) {
            let attention = if snapshot.needs_attention { "  ⚠️  check credentials" } else { "" };
            println!(
                "      {:<17} {:<9} failures={}{attention}",
                snapshot.capability.to_string(),
                snapshot.state.to_string(),
                snapshot.consecutive_failures
            );
        }
    }
    Ok(())
}

pub fn presets(config: &AppConfig) -> anyhow::Result<()> {
    let table = config.speech.preset_table()?;

    println!("🎭 Voice presets:");
    for name in table.names() {
        let Some(preset) = table.get(name) else {
            continue;
        };
        println!(
            "   {name}: stability={:.2} similarity={:.2} style={:.2} speed={:.2}",
            preset.stability, preset.similarity_boost, preset.style, preset.speed
        );
        for (provider, voice) in &preset.voices {
            println!("      {provider:<12} {voice}");
        }
    }
    Ok(())
}

pub async fn speak(service: &VoiceService, args: SpeakArgs, cancel: &CancellationToken) -> anyhow::Result<()> {
    if args.prime {
        let report = service.prime(cancel).await;
        println!(
            "🔥 Primed {} phrase(s), apology ready: {}",
            report.cached, report.apology_ready
        );
        for (phrase, reason) in &report.failed {
            println!("   ⚠️  \"{phrase}\": {reason}");
        }
    }

    let mut request = SynthesisRequest::new(args.text, args.profile);
    if let Some(provider) = args.provider {
        request = request.with_provider(provider);
    }

    let mut last = None;
    for _ in 0..args.repeat.max(1) {
        let result = service.synthesize(&request, cancel).await?;
        println!(
            "🔊 {} {}ms{} ({} bytes {})",
            result.provider_used,
            result.latency_ms,
            if result.cache_hit { " (cache hit)" } else { "" },
            result.audio.size_bytes(),
            result.audio.mime_type()
        );
        last = Some(result);
    }

    let Some(result) = last else {
        return Ok(());
    };
    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(result.audio.filename("speech")));
    tokio::fs::write(&path, result.audio.data())
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("💾 Saved to {}", path.display());

    let stats = service.cache_stats().await;
    println!(
        "📦 Cache: {} hit(s), {} miss(es), {} entr(ies)",
        stats.hits, stats.misses, stats.entries
    );
    Ok(())
}

pub async fn transcribe(
    service: &VoiceService,
    args: TranscribeArgs,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let format = format_for(&args.file)?;
    let audio = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let mut request = match args.mode {
        TranscriptionMode::Batch => {
            TranscriptionRequest::batch(AudioData::new(audio, format).with_sample_rate(args.sample_rate))
        },
        TranscriptionMode::Live => TranscriptionRequest::live(
            AudioStream::from_chunks(format, split_chunks(&audio, args.chunk_bytes))
                .with_sample_rate(args.sample_rate),
        ),
    };
    if let Some(language) = args.language {
        request = request.with_language(language);
    }
    if let Some(provider) = args.provider {
        request = request.with_provider(provider);
    }

    let result = match args.mode {
        TranscriptionMode::Batch => service.transcribe(request, &cancel).await?,
        TranscriptionMode::Live => {
            let mut stream = service.transcribe_stream(request, cancel)?;
            loop {
                match stream.next().await {
                    Some(Ok(TranscriptEvent::Partial { text, .. })) => println!("   … {text}"),
                    Some(Ok(TranscriptEvent::Final(result))) => break result,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(SpeechError::Cancelled.into()),
                }
            }
        },
    };

    print_transcript(&result);
    Ok(())
}

fn print_transcript(result: &TranscriptionResult) {
    println!(
        "📝 {} ({}, {}ms, confidence {:.2}, {})",
        result.provider_used,
        result.language,
        result.latency_ms,
        result.confidence,
        if result.words.is_empty() {
            "no word timings".to_string()
        } else {
            format!("{} words", result.words.len())
        }
    );
    println!("{}", result.text);
}

fn format_for(path: &Path) -> anyhow::Result<AudioFormat> {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        bail!("cannot infer audio format of {}: no extension", path.display());
    };
    match AudioFormat::from_extension(ext) {
        Some(format) => Ok(format),
        None => bail!("unsupported audio format: .{ext}"),
    }
}

fn split_chunks(audio: &[u8], chunk_bytes: usize) -> Vec<Bytes> {
    audio
        .chunks(chunk_bytes.max(1))
        .map(Bytes::copy_from_slice)
        .collect()
}
