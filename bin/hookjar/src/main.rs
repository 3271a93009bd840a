use hookjar::jvm::{ClassName, Name};
use hookjar::launch::{
    ClassMaterializer, Environment, GameVersion, LaunchContext, LaunchError, MapClassSource,
    WidenTargets,
};
use hookjar::patch::PatchPipeline;

use clap::{Arg, ArgAction, Command};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

fn main() -> Result<(), LaunchError> {
    env_logger::init();

    let matches = Command::new("hookjar")
        .version("0.1.0")
        .about("Patch loader hooks into a directory of encoded game classes")
        .arg(
            Arg::new("entry")
                .long("entry")
                .value_name("CLASS")
                .required(true)
                .help("Entry class in dotted form (eg. `net.minecraft.client.main.Main`)"),
        )
        .arg(
            Arg::new("game-version")
                .long("game-version")
                .value_name("VERSION")
                .required(true)
                .help("Version of the game the class bodies belong to"),
        )
        .arg(
            Arg::new("widener")
                .long("widener")
                .value_name("FILE")
                .help("Access widener file applied while serving"),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .value_name("SIDE")
                .default_value("client")
                .help("Physical side, `client` or `server`"),
        )
        .arg(
            Arg::new("compat")
                .long("fix-package-access")
                .action(ArgAction::SetTrue)
                .help("Open package-private game internals up for the compatibility layer"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .value_name("OUT_DIR")
                .required(true)
                .help("Directory the served classes get written into"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Directory of encoded class bodies (`.cls`)")
                .required(true)
                .index(1),
        )
        .get_matches();

    let class_dir = Path::new(matches.get_one::<String>("INPUT").unwrap());
    let mut source = MapClassSource::new();
    let mut scanned = vec![];
    for entry in WalkDir::new(class_dir) {
        let entry = entry.map_err(walk_error)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "cls") {
            continue;
        }
        let relative = path
            .strip_prefix(class_dir)
            .map_err(|err| invalid_input(err.to_string()))?
            .with_extension("");
        let internal = relative
            .to_string_lossy()
            .replace(std::path::MAIN_SEPARATOR, "/");
        let name = ClassName::from_string(internal).map_err(invalid_input)?;
        source.insert_bytes(name.clone(), fs::read(path).map_err(LaunchError::Source)?);
        scanned.push(name);
    }
    log::info!(
        "Scanned {} class bodies under '{}'",
        scanned.len(),
        class_dir.display()
    );

    let entry_class =
        ClassName::from_dotted(matches.get_one::<String>("entry").unwrap()).map_err(invalid_input)?;
    let version = GameVersion::new(matches.get_one::<String>("game-version").unwrap().as_str());
    let mut cx = LaunchContext::new(Box::new(source), entry_class, version);

    match matches.get_one::<String>("env").unwrap().as_str() {
        "client" => {}
        "server" => cx.environment = Environment::Server,
        other => return Err(invalid_input(format!("unknown side `{}`", other))),
    }
    if let Some(widener_path) = matches.get_one::<String>("widener") {
        let file = fs::File::open(widener_path).map_err(LaunchError::Source)?;
        cx.widen_targets =
            WidenTargets::parse(io::BufReader::new(file)).map_err(LaunchError::Source)?;
        log::info!("Loaded access widener '{}'", widener_path);
    }
    cx.package_access_fix = matches.get_flag("compat");

    let pipeline = PatchPipeline::with_default_rules();
    let result = pipeline.locate_entrypoints(&cx).map_err(LaunchError::Patch)?;
    if let Some(applet) = result.applet_entry() {
        log::info!("Applet-era entry point '{}'", applet.as_dotted());
    }

    let out_dir = Path::new(matches.get_one::<String>("out").unwrap());
    let loader = ClassMaterializer::new(&cx, &pipeline);
    let mut written = 0;
    let scanned_set: HashSet<&ClassName> = scanned.iter().collect();
    let synthetic: Vec<ClassName> = result
        .class_names()
        .filter(|name| !scanned_set.contains(name))
        .cloned()
        .collect();

    for name in scanned.iter().chain(synthetic.iter()) {
        let live = loader.load(name)?;
        let target = out_dir.join(format!("{}.cls", name.as_str()));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(LaunchError::Source)?;
        }
        fs::write(&target, &live.bytes).map_err(LaunchError::Source)?;
        written += 1;

        let disposition = if result.contains(name) {
            "patched"
        } else if cx.is_game_class(name)
            && (cx.widen_targets.targets_class(name) || cx.package_access_fix)
        {
            "rewritten"
        } else {
            "copied"
        };
        log::info!("{} '{}'", disposition, name.as_str());
    }

    log::info!("Wrote {} classes to '{}'", written, out_dir.display());
    Ok(())
}

fn invalid_input(message: impl Into<String>) -> LaunchError {
    LaunchError::Source(io::Error::new(io::ErrorKind::InvalidInput, message.into()))
}

fn walk_error(error: walkdir::Error) -> LaunchError {
    LaunchError::Source(io::Error::new(io::ErrorKind::Other, error))
}
