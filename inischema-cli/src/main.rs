use clap::{Parser, Subcommand};
use inischema::{
    parse_file, types, ErrorLog, FileSchema, HookOutcome, IniValue, OptionDecl, OrderedIndex,
    SectionBody, SectionFlags, SinkAction, Value,
};
use std::process;

/// inischema CLI — validate and inspect INI files against the bundled
/// example server-config schema
#[derive(Parser)]
#[command(name = "inischema", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a config file and report whether it is valid
    Check {
        /// Path to the INI file
        file: String,
        /// Treat warnings as fatal
        #[arg(long)]
        strict_warnings: bool,
    },

    /// Parse a config file and print the typed document
    Dump {
        /// Path to the INI file
        file: String,
    },

    /// Print the sections and options the bundled schema expects
    Schema,
}

/// The example schema: a small server config with a required `[server]`
/// section, a `[limits]` section synthesized from defaults when absent, and
/// any number of `[listener:ID]` instances.
fn demo_schema() -> inischema::Result<FileSchema> {
    let mut schema = FileSchema::new();

    let server = schema.add_section(
        "server",
        SectionFlags { required: true, ..Default::default() },
    )?;
    server.add_option(OptionDecl::new("host", &types::STRING).required())?;
    server.add_option(
        OptionDecl::new("port", &types::INT)
            .default_value(Value::Int(8080))
            .post_parse(|value, _, _| match value.value().as_int() {
                Some(port) if (1..=65535).contains(&port) => {
                    if port < 1024 {
                        Ok(HookOutcome::Warn(format!("port {port} is privileged")))
                    } else {
                        Ok(HookOutcome::Done)
                    }
                }
                Some(port) => Err(format!("port {port} out of range (1 - 65535)")),
                None => Err("not an integer".to_string()),
            }),
    )?;
    server.add_option(OptionDecl::new("workers", &types::INT).default_value(Value::Int(4)))?;
    server.add_option(OptionDecl::new("features", &types::STR_LIST))?;

    let limits = schema.add_section(
        "limits",
        SectionFlags { required: true, create_if_absent: true, ..Default::default() },
    )?;
    limits.add_option(OptionDecl::new("max_clients", &types::INT).default_value(Value::Int(64)))?;
    limits.add_option(
        OptionDecl::new("timeout_ms", &types::INT).default_value(Value::Int(5000)),
    )?;

    let listener = schema.add_section(
        "listener",
        SectionFlags { multiple: true, not_empty: true, ..Default::default() },
    )?;
    listener.add_option(OptionDecl::new("bind", &types::STRING).required())?;
    listener.add_option(OptionDecl::new("backlog", &types::INT).default_value(Value::Int(128)))?;
    listener.add_option(
        OptionDecl::new("tls", &types::BOOL)
            .default_value(Value::Bool(false))
            .post_parse(|value, sect, _| {
                if value.value().as_bool() == Some(true) && sect.value("cert").is_none() {
                    Err("tls enabled but no cert configured".to_string())
                } else {
                    Ok(HookOutcome::Done)
                }
            }),
    )?;
    listener.add_option(OptionDecl::new("cert", &types::STRING))?;

    Ok(schema)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        let mut log = ErrorLog::new();
        log.record(&e);
        eprintln!("ERROR: {}", log.last().unwrap_or("unknown error"));
        process::exit(1);
    }
}

fn run(cli: Cli) -> inischema::Result<()> {
    match cli.command {
        Command::Check { file, strict_warnings } => check(&file, strict_warnings),
        Command::Dump { file } => dump(&file),
        Command::Schema => show_schema(),
    }
}

fn check(file: &str, strict_warnings: bool) -> inischema::Result<()> {
    let schema = demo_schema()?;
    log::info!("checking {file}");

    let mut warnings = 0u32;
    let sections;
    {
        let mut sink = |msg: &str| {
            if strict_warnings {
                SinkAction::Stop
            } else {
                eprintln!("warning: {msg}");
                warnings += 1;
                SinkAction::Continue
            }
        };
        let doc = parse_file(&schema, file, Some(&mut sink))?;
        sections = doc.sections().count();
    }

    println!("OK: {file} is valid ({sections} section(s), {warnings} warning(s))");
    Ok(())
}

fn dump(file: &str) -> inischema::Result<()> {
    let schema = demo_schema()?;
    let doc = parse_file(&schema, file, None)?;

    for (name, sect) in doc.sections() {
        match sect.body() {
            SectionBody::Values(values) => {
                println!("[{name}]");
                print_values(values)?;
                println!();
            }
            SectionBody::Instances(instances) => {
                for (id, inst) in instances.iter() {
                    println!("[{name}:{id}]");
                    if let SectionBody::Values(values) = inst.body() {
                        print_values(values)?;
                    }
                    println!();
                }
            }
        }
    }
    Ok(())
}

fn print_values(values: &OrderedIndex<IniValue<'_>>) -> inischema::Result<()> {
    for (name, value) in values.iter() {
        let text = value
            .schema()
            .ty()
            .format(value.value())
            .map_err(inischema::Error::Value)?;
        println!("{name} = {text}");
    }
    Ok(())
}

fn show_schema() -> inischema::Result<()> {
    let schema = demo_schema()?;

    for (name, sect) in schema.sections() {
        let flags = sect.flags();
        let mut notes = Vec::new();
        if flags.required {
            notes.push("required");
        }
        if flags.multiple {
            notes.push("multiple");
        }
        if flags.not_empty {
            notes.push("not empty");
        }
        if flags.create_if_absent {
            notes.push("created if absent");
        }
        if notes.is_empty() {
            println!("[{name}]");
        } else {
            println!("[{name}]  ; {}", notes.join(", "));
        }

        for (opt_name, opt) in sect.options() {
            let mut parts = vec![opt.ty().name().to_string()];
            if opt.required() {
                parts.push("required".to_string());
            }
            if let Some(default) = opt.default_value() {
                let text = opt.ty().format(default).map_err(inischema::Error::Value)?;
                parts.push(format!("default {text}"));
            }
            println!("{opt_name} = <{}>", parts.join(", "));
        }
        println!();
    }
    Ok(())
}
