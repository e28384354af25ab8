//! CLI for GenReel - narrated short videos with Gemini and Veo.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genreel::image::{AspectRatio, ImageFormat, ImageRequest};
use genreel::video::{ImageInput, VideoRequest, VideoSource};
use genreel::{AgentConfig, MediaArtifact, MediaMerger, MergeOutcome, VideoAgent};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "genreel")]
#[command(about = "Generate scripts, images, narration and Veo videos, then merge them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gemini API key
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Give up on a video job after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// ffmpeg program used for merging
    #[arg(long, global = true, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate text from a prompt
    Text(TextArgs),

    /// Generate an image from a text prompt
    Image(ImageArgs),

    /// Read text aloud into an audio file
    Speech(SpeechArgs),

    /// Generate a video from a text prompt
    Video(VideoArgs),

    /// Continue a previously generated video
    Extend(ExtendArgs),

    /// Lay an audio track under a video
    Merge(MergeArgs),

    /// Script, narrate, film and merge a video about a topic
    Produce(ProduceArgs),
}

#[derive(Args)]
struct TextArgs {
    /// The prompt
    prompt: String,

    /// System instruction
    #[arg(short, long)]
    system: Option<String>,
}

#[derive(Args)]
struct ImageArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "16:9")]
    aspect_ratio: AspectRatioArg,

    /// Seed for deterministic generation
    #[arg(long)]
    seed: Option<u64>,

    /// Input image for editing (path to image file)
    #[arg(short, long)]
    input: Option<PathBuf>,
}

#[derive(Args)]
struct SpeechArgs {
    /// The text to read
    text: String,

    /// Output file path (PCM is written as WAV)
    #[arg(short, long)]
    output: PathBuf,

    /// Prebuilt voice name
    #[arg(long, default_value = genreel::speech::DEFAULT_VOICE)]
    voice: String,
}

#[derive(Args)]
struct VideoArgs {
    /// The text prompt describing the video
    prompt: String,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Video duration in seconds
    #[arg(short, long, default_value_t = genreel::video::DEFAULT_DURATION_SECS)]
    duration: u32,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "16:9")]
    aspect_ratio: AspectRatioArg,

    /// Resolution (e.g., 720p, 1080p)
    #[arg(long)]
    resolution: Option<String>,

    /// What the video should not contain
    #[arg(long)]
    negative_prompt: Option<String>,

    /// First frame (image-to-video)
    #[arg(short, long)]
    image: Option<PathBuf>,
}

#[derive(Args)]
#[command(group = clap::ArgGroup::new("source").required(true))]
struct ExtendArgs {
    /// What happens next
    prompt: String,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// URI of a video the service generated
    #[arg(long, group = "source")]
    video_uri: Option<String>,

    /// Local MP4 to upload
    #[arg(long, group = "source")]
    video: Option<PathBuf>,
}

#[derive(Args)]
struct MergeArgs {
    /// Video input
    #[arg(long)]
    video: PathBuf,

    /// Audio input
    #[arg(long)]
    audio: PathBuf,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Exit non-zero instead of falling back to the unmerged video
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct ProduceArgs {
    /// What the video is about
    topic: String,

    /// Directory for intermediate and final files
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Prebuilt voice name
    #[arg(long, default_value = genreel::speech::DEFAULT_VOICE)]
    voice: String,

    /// Aspect ratio
    #[arg(long, value_enum, default_value = "16:9")]
    aspect_ratio: AspectRatioArg,

    /// Generate a still first and animate it
    #[arg(long)]
    with_image: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "3:4")]
    StandardPortrait,
    #[value(name = "21:9")]
    Ultrawide,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::StandardPortrait => AspectRatio::StandardPortrait,
            AspectRatioArg::Ultrawide => AspectRatio::Ultrawide,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Cli {
        command,
        api_key,
        json,
        timeout,
        ffmpeg,
        ..
    } = cli;

    // Merging needs no credential, so the agent is only built on demand.
    let agent = || build_agent(api_key.as_deref(), timeout, &ffmpeg);

    match command {
        Commands::Text(args) => generate_text(&agent()?, args, json).await?,
        Commands::Image(args) => generate_image(&agent()?, args, json).await?,
        Commands::Speech(args) => generate_speech(&agent()?, args, json).await?,
        Commands::Video(args) => generate_video(&agent()?, args, json).await?,
        Commands::Extend(args) => extend_video(&agent()?, args, json).await?,
        Commands::Produce(args) => produce(&agent()?, args, json).await?,
        Commands::Merge(args) => merge(&ffmpeg, args, json).await?,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "genreel=info",
        _ => "genreel=debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(env_filter)
        .init();
}

fn build_agent(
    api_key: Option<&str>,
    timeout: Option<u64>,
    ffmpeg: &Path,
) -> anyhow::Result<VideoAgent> {
    let mut builder = AgentConfig::builder().ffmpeg(ffmpeg);
    if let Some(key) = api_key {
        builder = builder.credential(key);
    }
    if let Some(secs) = timeout {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(VideoAgent::new(builder.build()?))
}

async fn generate_text(
    agent: &VideoAgent,
    args: TextArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let text = agent
        .generate_text(&args.prompt, args.system.as_deref())
        .await?;

    if json_output {
        let result = serde_json::json!({
            "type": "text",
            "success": true,
            "model": agent.text().model(),
            "text": text,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", text);
    }

    Ok(())
}

async fn generate_image(
    agent: &VideoAgent,
    args: ImageArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut request = ImageRequest::new(&args.prompt).with_aspect_ratio(args.aspect_ratio.into());

    if let Some(s) = args.seed {
        request = request.with_seed(s);
    }

    // Read input image for editing
    if let Some(ref input_path) = args.input {
        let input_data = std::fs::read(input_path)?;
        request = request.with_input_image(input_data);
    }

    let image = agent.generate_image_with(&request).await?;
    if let Some(named) = ImageFormat::from_path(&args.output) {
        if named != image.format {
            tracing::warn!(
                output = %args.output.display(),
                generated = image.format.extension(),
                "output extension does not match the generated image format"
            );
        }
    }
    image.save(&args.output)?;

    if json_output {
        let result = serde_json::json!({
            "type": "image",
            "success": true,
            "output": args.output.display().to_string(),
            "size_bytes": image.size(),
            "format": image.format.extension(),
            "model": image.metadata.model,
            "duration_ms": image.metadata.duration_ms,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Generated image: {} ({} bytes)",
            args.output.display(),
            image.size()
        );
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}

async fn generate_speech(
    agent: &VideoAgent,
    args: SpeechArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let audio = agent
        .generate_audio(&args.text, Some(&args.voice), &args.output)
        .await?;
    print_artifact("audio", &audio, json_output)
}

async fn generate_video(
    agent: &VideoAgent,
    args: VideoArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut request = VideoRequest::new(&args.prompt)
        .with_duration(args.duration)
        .with_aspect_ratio(args.aspect_ratio.into());

    if let Some(r) = args.resolution {
        request = request.with_resolution(r);
    }
    if let Some(n) = args.negative_prompt {
        request = request.with_negative_prompt(n);
    }
    if let Some(ref image_path) = args.image {
        request = request.with_image(ImageInput::from_bytes(std::fs::read(image_path)?));
    }

    let video = agent.generate_video(&request, &args.output).await?;
    print_artifact("video", &video, json_output)
}

async fn extend_video(
    agent: &VideoAgent,
    args: ExtendArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let source = match (args.video_uri, args.video) {
        (Some(uri), _) => VideoSource::from_uri(uri),
        (None, Some(path)) => VideoSource::from_bytes(std::fs::read(path)?),
        (None, None) => anyhow::bail!("pass --video-uri or --video"),
    };

    let video = agent.extend_video(source, &args.prompt, &args.output).await?;
    print_artifact("video", &video, json_output)
}

async fn produce(agent: &VideoAgent, args: ProduceArgs, json_output: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(&args.dir)?;
    let narration_path = args.dir.join("narration.wav");
    let video_path = args.dir.join("video.mp4");
    let final_path = args.dir.join("final.mp4");

    let script = agent
        .generate_text(
            &format!("Write the narration for an 8 second video about: {}", args.topic),
            Some(
                "You write voice-over scripts. Reply with at most 20 spoken words, \
                 no stage directions, no quotes.",
            ),
        )
        .await?;
    let shot = agent
        .generate_text(
            &format!(
                "Describe one cinematic shot for a video about {} narrated as: {}",
                args.topic, script
            ),
            Some("Reply with a single-paragraph video generation prompt and nothing else."),
        )
        .await?;

    let audio = agent
        .generate_audio(&script, Some(&args.voice), &narration_path)
        .await?;

    let aspect_ratio: AspectRatio = args.aspect_ratio.into();
    let mut request = VideoRequest::new(shot.trim()).with_aspect_ratio(aspect_ratio);
    if args.with_image {
        let still = agent.generate_image(shot.trim(), aspect_ratio).await?;
        request = request.with_image(ImageInput::from_bytes(still.bytes()?));
    }
    let video = agent.generate_video(&request, &video_path).await?;

    let outcome = agent
        .merge_media(artifact_path(&video)?, artifact_path(&audio)?, &final_path)
        .await;

    if json_output {
        let result = serde_json::json!({
            "type": "production",
            "success": true,
            "script": script.trim(),
            "shot": shot.trim(),
            "narration": narration_path.display().to_string(),
            "video": video_path.display().to_string(),
            "video_uri": video.remote_uri(),
            "output": outcome.path().display().to_string(),
            "merged": outcome.is_merged(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Script: {}", script.trim());
        println!("Narration: {}", narration_path.display());
        println!("Video: {}", video_path.display());
        print_merge_line(&outcome);
    }

    Ok(())
}

fn artifact_path(artifact: &MediaArtifact) -> anyhow::Result<&Path> {
    artifact
        .path()
        .ok_or_else(|| anyhow::anyhow!("{} artifact was not written to disk", artifact.kind))
}

fn print_artifact(label: &str, artifact: &MediaArtifact, json_output: bool) -> anyhow::Result<()> {
    let path = artifact_path(artifact)?;
    let size = artifact.size()?;

    if json_output {
        let result = serde_json::json!({
            "type": label,
            "success": true,
            "output": path.display().to_string(),
            "size_bytes": size,
            "mime_type": artifact.mime_type,
            "uri": artifact.remote_uri(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Generated {}: {} ({} bytes)", label, path.display(), size);
        if let Some(uri) = artifact.remote_uri() {
            println!("URI: {}", uri);
        }
    }

    Ok(())
}

async fn merge(ffmpeg: &Path, args: MergeArgs, json_output: bool) -> anyhow::Result<()> {
    let outcome = MediaMerger::new(ffmpeg)
        .merge(&args.video, &args.audio, &args.output)
        .await;
    let strict = args.strict;
    if json_output {
        let reason = match &outcome {
            MergeOutcome::Merged(_) => None,
            MergeOutcome::MergeFailed { reason, .. } => Some(reason.to_string()),
        };
        let result = serde_json::json!({
            "type": "merge",
            "success": outcome.is_merged(),
            "output": outcome.path().display().to_string(),
            "error": reason,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_merge_line(&outcome);
    }

    if strict {
        outcome.into_result()?;
    }
    Ok(())
}

fn print_merge_line(outcome: &MergeOutcome) {
    match outcome {
        MergeOutcome::Merged(path) => println!("Merged: {}", path.display()),
        MergeOutcome::MergeFailed { reason, fallback } => {
            println!("Merge failed ({}); unmerged video: {}", reason, fallback.display());
        }
    }
}
