// Thumbforge - AI thumbnail batch generation from the command line

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use thumbforge::album::AlbumImage;
use thumbforge::export::ExportImage;
use thumbforge::generation::types::{decode_data_uri, share_link};
use thumbforge::{
    AlbumCompositor, AppConfig, ExportPackager, GeminiClient, GenerationOrchestrator,
    PromptEnhancer, ThumbnailGenerator, UserChoices,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thumbforge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 5 {
        print_usage();
        return Ok(());
    }

    let photo_path = PathBuf::from(&args[1]);
    if !photo_path.exists() {
        eprintln!("Error: File not found: {}", photo_path.display());
        return Ok(());
    }

    let choices = UserChoices {
        video_type: args[2].clone(),
        style_mood: args[3].clone(),
        photo_placement: args[4].clone(),
        prompt: args[5..].join(" "),
    };

    let config = AppConfig::from_env()?;
    let output_dir = std::env::var("THUMBFORGE_OUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("thumbforge-output"));

    println!("🎬 Thumbforge Batch Generation");
    println!("================================\n");
    println!("📷 Photo: {}", photo_path.display());
    println!("🎯 Video type: {}", choices.video_type);
    println!("🎨 Style: {}", choices.style_mood);
    println!("📐 Placement: {}\n", choices.photo_placement);

    let photo_data_uri = read_photo(&photo_path)?;

    let enhancer = PromptEnhancer::new(GeminiClient::with_base_url(
        &config.text_api_key,
        &config.base_url,
    ));
    let generator = ThumbnailGenerator::new(
        enhancer,
        GeminiClient::with_base_url(&config.image_api_key, &config.base_url),
    );
    let orchestrator = Arc::new(GenerationOrchestrator::new(Arc::new(generator)));

    // Report progress while the batch settles.
    let reporter = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            let mut last = 0;
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let progress = orchestrator.progress();
                if progress.current != last {
                    last = progress.current;
                    println!("⏳ {}/{} variants settled", progress.current, progress.total);
                }
                if progress.is_complete() {
                    break;
                }
            }
        })
    };

    println!("🚀 Generating thumbnails...\n");
    let summary = orchestrator.run_batch(photo_data_uri, choices.clone()).await;
    reporter.await?;

    println!("\n📊 Batch result: {} succeeded, {} failed\n", summary.succeeded, summary.failed);
    for variant in orchestrator.variants() {
        match variant.error() {
            None => println!("✓ Variant {} ({})", variant.id, variant.aspect_ratio),
            Some(error) => println!("❌ Variant {} ({}): {}", variant.id, variant.aspect_ratio, error),
        }
    }

    let successful = orchestrator.successful();
    if successful.is_empty() {
        eprintln!("\nNo thumbnails were generated; nothing to write.");
        return Ok(());
    }

    std::fs::create_dir_all(&output_dir)?;

    for variant in &successful {
        if let Some(url) = variant.url() {
            let path = output_dir.join(format!("variant-{}.jpg", variant.id));
            std::fs::write(&path, decode_data_uri(url)?)?;
        }
    }

    let export_images: Vec<ExportImage> = successful
        .iter()
        .filter_map(|variant| {
            variant.url().map(|url| ExportImage {
                id: variant.id,
                aspect_ratio: variant.aspect_ratio,
                data_uri: url.to_string(),
            })
        })
        .collect();
    let archive = ExportPackager::new().package_all(export_images).await?;
    let archive_path = output_dir.join("thumbnails.zip");
    std::fs::write(&archive_path, archive)?;
    println!("\n📦 Download archive: {}", archive_path.display());

    let album_images: Vec<AlbumImage> = successful
        .iter()
        .filter_map(|variant| {
            variant.url().map(|url| AlbumImage {
                data_uri: url.to_string(),
                aspect_ratio: variant.aspect_ratio,
            })
        })
        .collect();
    let album = AlbumCompositor::new().compose(album_images).await?;
    let album_path = output_dir.join("album-page.jpg");
    std::fs::write(&album_path, album)?;
    println!("🖼  Album page: {}", album_path.display());

    println!(
        "🔗 Share link: {}",
        share_link("https://thumbforge.app", &choices, successful.len())
    );
    println!("\n✓ Done!");

    Ok(())
}

fn read_photo(path: &Path) -> Result<String, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let mime = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        Some(ext) if ext.eq_ignore_ascii_case("webp") => "image/webp",
        _ => "image/jpeg",
    };
    Ok(format!("data:{mime};base64,{}", BASE64.encode(&bytes)))
}

fn print_usage() {
    println!("Thumbforge - AI thumbnail batch generation");
    println!();
    println!("Usage: thumbforge <photo> <video-type> <style-mood> <placement> [prompt...]");
    println!();
    println!("The system will:");
    println!("  1. Enhance your request into a structured creative brief");
    println!("  2. Generate six thumbnails in parallel (three 16:9, three 9:16)");
    println!("  3. Write each result, a normalized ZIP archive, and an album page");
    println!();
    println!("Environment variables:");
    println!("  GEMINI_API_KEY        - API key for both pipeline stages (required)");
    println!("  GEMINI_TEXT_API_KEY   - Override key for the prompt-enhancement model");
    println!("  GEMINI_IMAGE_API_KEY  - Override key for the image model");
    println!("  GEMINI_BASE_URL       - Endpoint override, e.g. a local proxy");
    println!("  THUMBFORGE_OUT        - Output directory (default: thumbforge-output)");
    println!();
    println!("Examples:");
    println!("  thumbforge selfie.jpg Gaming Bold Left epic ranked comeback");
    println!("  thumbforge me.png Tutorial Minimalist Right sourdough basics");
}
