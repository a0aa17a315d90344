mod session;

use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use argh::FromArgs;
use image2text::{
    vlm::{paligemma::PaligemmaLoader, BackendLoader},
    AppConfig, GenerationResult, InferenceService, ResultPersister,
};
use session::{Command, Session, Settings, HELP, MODEL_CANDIDATES};

#[derive(FromArgs)]
/// Describe one or more images with a vision-language model
struct Args {
    /// path to an input image, repeat for several
    #[argh(option, short = 'i')]
    image: Vec<PathBuf>,

    /// question or instruction about the images
    #[argh(option, short = 'p')]
    prompt: Option<String>,

    /// model number from the list, or a model identifier (defaults to I2T_MODEL)
    #[argh(option, short = 'm')]
    model: Option<String>,

    /// device preference: auto, cuda or cpu
    #[argh(option, default = "String::from(\"auto\")")]
    device: String,

    /// the maximum length of the generated text (32 to 1024)
    #[argh(option, default = "256")]
    max_new_tokens: usize,

    /// sampling temperature (0.0 to 1.0)
    #[argh(option, default = "0.2")]
    temperature: f64,

    /// directory to write results to (defaults to OUTPUT_DIR)
    #[argh(option)]
    output_dir: Option<PathBuf>,

    /// read commands and prompts from stdin
    #[argh(switch)]
    interactive: bool,
}

fn print_result(result: &GenerationResult) {
    println!("{}", result.text());
    if let Some(path) = result.persisted_path() {
        println!("saved to {} ({})", path.display(), result.file_name());
    }
}

fn interactive<L: BackendLoader>(
    session: &mut Session<L>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Models:");
    for (i, model) in MODEL_CANDIDATES.iter().enumerate() {
        println!("  {}. {model}", i + 1);
    }
    println!("{HELP}");
    println!("{}", session.settings);

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let command = match Command::parse(&line?) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let outcome = match command {
            Command::Quit => break,
            Command::Help => {
                println!("{HELP}");
                Ok(())
            }
            Command::Settings => {
                println!("{} | images: {:?}", session.settings, session.images());
                Ok(())
            }
            Command::Image(path) => {
                session.queue_image(path);
                println!("{} image(s) queued", session.images().len());
                Ok(())
            }
            Command::Clear => {
                session.clear_images();
                Ok(())
            }
            Command::Model(choice) => session.settings.set_model(&choice),
            Command::Device(preference) => session.settings.set_device(&preference),
            Command::Tokens(n) => session.settings.set_max_new_tokens(n),
            Command::Temperature(t) => session.settings.set_temperature(t),
            Command::Describe(prompt) => match session.describe(prompt) {
                Ok(result) => {
                    print_result(&result);
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            },
        };

        if let Err(e) = outcome {
            eprintln!("error: {e}");
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config = AppConfig::from_env();
    if let Some(output_dir) = args.output_dir {
        config = config.with_output_dir(output_dir);
    }

    let mut settings = Settings::new(config.default_model.clone());
    if let Some(model) = &args.model {
        settings.set_model(model)?;
    }
    settings.set_device(&args.device)?;
    settings.set_max_new_tokens(args.max_new_tokens)?;
    settings.set_temperature(args.temperature)?;

    let persister = ResultPersister::from_config(&config);
    log::info!("writing results to {}", persister.output_dir().display());

    let service = InferenceService::new(config, PaligemmaLoader::default());
    let mut session = Session::new(service, persister, settings);
    for image in args.image {
        session.queue_image(image);
    }

    if args.interactive {
        return interactive(&mut session);
    }

    let result = session.describe(args.prompt)?;
    print_result(&result);

    Ok(())
}
