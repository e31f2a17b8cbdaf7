use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pointage_api::{outcome_of, ApiClient, AttendanceApi};
use pointage_core::cameras::{select_camera, SourceMode, DEFAULT_CAMERA_ID};
use pointage_core::classifier::classify_block;
use pointage_core::{AttendanceOutcome, Decision, DecisionEngine, DEFAULT_ACTION_THRESHOLD};
use pointage_hw::frame::{encode_jpeg, is_dark_frame};
use pointage_hw::{Frame, V4lCamera};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pointage", about = "Pointage attendance kiosk CLI")]
struct Cli {
    /// API base URL (default: $POINTAGE_API_BASE or http://localhost:8000/api)
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the cameras configured on the server
    Cameras,
    /// Send one JPEG to the recognition service
    Recognize {
        /// JPEG image file
        image: PathBuf,
        /// Confidence required before an attendance write
        #[arg(long, default_value_t = DEFAULT_ACTION_THRESHOLD)]
        threshold: f32,
        /// Log attendance when the match qualifies
        #[arg(long)]
        log: bool,
        /// Camera identifier sent with the write
        #[arg(long, default_value = DEFAULT_CAMERA_ID)]
        camera: String,
    },
    /// Check in with an employee ID and PIN
    Pin {
        #[arg(short, long)]
        employee: String,
        #[arg(short, long)]
        pin: String,
        /// JPEG photo to attach
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Classify a blocked-write message as the kiosk would display it
    Classify {
        message: String,
        /// Print the classification as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run local camera diagnostics
    Test {
        /// V4L2 device to capture from
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
        /// Where to write the captured JPEG
        #[arg(short, long, default_value = "pointage-test.jpg")]
        output: PathBuf,
        /// Frames to discard before capturing
        #[arg(long, default_value_t = 4)]
        warmup: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let api_base = cli
        .api
        .or_else(|| std::env::var("POINTAGE_API_BASE").ok())
        .unwrap_or_else(|| "http://localhost:8000/api".to_string());

    match cli.command {
        Commands::Cameras => {
            let api = client(&api_base)?;
            let cameras = api.list_cameras().await.context("failed to list cameras")?;
            if cameras.is_empty() {
                println!("No cameras configured");
                return Ok(());
            }
            let selected = select_camera(&cameras).map(|c| c.id);
            for camera in &cameras {
                let mode = match camera.source_mode() {
                    SourceMode::Local => "local".to_string(),
                    SourceMode::Remote { camera_id } => format!("stream/{camera_id}"),
                };
                println!(
                    "{} {:>3}  {:<20} {:<12} {}",
                    if Some(camera.id) == selected { "*" } else { " " },
                    camera.id,
                    camera.name,
                    mode,
                    if camera.is_active { "active" } else { "inactive" },
                );
            }
        }
        Commands::Recognize {
            image,
            threshold,
            log,
            camera,
        } => {
            let jpeg = std::fs::read(&image)
                .with_context(|| format!("failed to read {}", image.display()))?;
            Frame::from_jpeg(&jpeg)
                .with_context(|| format!("{} is not a readable JPEG", image.display()))?;

            let api = client(&api_base)?;
            let matched = api.recognize(jpeg).await.context("recognition failed")?;
            println!(
                "name: {}  confidence: {:.3}  employee_id: {}",
                matched.name.as_deref().unwrap_or("-"),
                matched.confidence,
                matched
                    .employee_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );

            match DecisionEngine::new(threshold).decide(&matched) {
                Decision::NoFace => println!("No face detected"),
                Decision::Unauthorized { .. } => println!("Unauthorized: no enrolled employee"),
                Decision::LowConfidence { confidence, .. } => {
                    println!("Low confidence ({confidence:.3} < {threshold}); no write")
                }
                Decision::Write(intent) if log => {
                    let result = api
                        .log_attendance(intent.employee_id, &camera, intent.confidence)
                        .await;
                    print_outcome(&outcome_of(result));
                }
                Decision::Write(_) => println!("Qualifies for an attendance write (use --log)"),
            }
        }
        Commands::Pin {
            employee,
            pin,
            photo,
        } => {
            if employee.is_empty() || pin.is_empty() {
                bail!("employee ID and PIN are both required");
            }
            let photo = photo
                .map(|path| {
                    std::fs::read(&path)
                        .with_context(|| format!("failed to read {}", path.display()))
                })
                .transpose()?;
            let api = client(&api_base)?;
            let outcome = outcome_of(api.verify_pin(&employee, &pin, photo).await);
            print_outcome(&outcome);
        }
        Commands::Classify { message, json } => {
            let info = classify_block(&message);
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("reason:  {}", info.reason.title());
                println!("subtext: {}", info.subtext);
                println!("color:   {}", info.color);
                println!(
                    "sound:   {}",
                    info.sound.map(|s| s.file_name()).unwrap_or("-")
                );
            }
        }
        Commands::Test {
            device,
            output,
            warmup,
        } => {
            println!("Running camera diagnostics...");
            let devices = V4lCamera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in &devices {
                println!("  {}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }

            let camera = V4lCamera::open(&device)?;
            println!("Opened {device}: {}x{} {:?}", camera.width, camera.height, camera.fourcc);
            for _ in 0..warmup {
                let _ = camera.capture_frame();
            }
            let frame = camera.capture_frame()?;
            if is_dark_frame(&frame.data, 0.95) {
                println!("Warning: captured frame is almost entirely dark");
            }
            let sample = encode_jpeg(&frame, 90)?;
            std::fs::write(&output, &sample.jpeg)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Wrote {} ({} bytes, {}x{})",
                output.display(),
                sample.jpeg.len(),
                sample.width,
                sample.height
            );
        }
    }

    Ok(())
}

fn client(base: &str) -> Result<ApiClient> {
    ApiClient::new(base, Duration::from_secs(10)).context("failed to build HTTP client")
}

fn print_outcome(outcome: &AttendanceOutcome) {
    let feedback = outcome.feedback();
    println!("{}  {}  [{}]", feedback.title, feedback.subtext, feedback.color);
    if let Some(sound) = outcome.sound() {
        println!("sound: {}", sound.file_name());
    }
}
