use clap::Parser;
use thumbview::{check_folder, init_logging, Args, ViewerApp, ViewerConfig};

const DEFAULT_WINDOW_WIDTH: f32 = 1200.0;
const DEFAULT_WINDOW_HEIGHT: f32 = 800.0;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);
    let config = ViewerConfig::from_args(&args)?;

    if args.check {
        let report = check_folder(&config, &args.path)?;
        println!(
            "Thumbnail check complete: {} rendered, {} unreadable",
            report.bound,
            report.pruned.len()
        );
        for path in &report.pruned {
            println!("  unreadable: {}", path.display());
        }
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([DEFAULT_WINDOW_WIDTH, DEFAULT_WINDOW_HEIGHT])
            .with_title("thumbview"),
        ..Default::default()
    };

    let start = args.path.clone();
    let result = eframe::run_native(
        "thumbview",
        options,
        Box::new(move |cc| {
            ViewerApp::new(cc, config, &start)
                .map(|app| Box::new(app) as Box<dyn eframe::App>)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        }),
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(anyhow::anyhow!("Failed to run application: {:?}", e)),
    }
}
