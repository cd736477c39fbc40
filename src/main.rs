mod cli;

use std::error::Error as StdError;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Command};
use xsd_codec::loader::SchemaLoader;
use xsd_codec::resolver::TypeRef;
use xsd_codec::walker::{Field, FieldKind};
use xsd_codec::xsd::{ParseOptions, PrefixedName};
use xsd_codec::{build, parse, resolve_schema, ResolvedSchema};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            let mut source = error.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn StdError>> {
    let mut loader = SchemaLoader::with_default_sources().parse_options(ParseOptions {
        allow_dtd: cli.allow_dtd,
    });
    let mut resolve = |location: &str| -> Result<Arc<ResolvedSchema>, Box<dyn StdError>> {
        let schema = loader.load(location)?;
        Ok(resolve_schema(&schema)?)
    };

    match &cli.command {
        Command::Fields { schema, type_name } => {
            let schema = resolve(schema)?;
            print_fields(&schema, type_name)
        }
        Command::Resolve { schema } => {
            let schema = resolve(schema)?;
            print_summary(&schema);
            Ok(())
        }
        Command::Parse { schema, xml } => {
            let schema = resolve(schema)?;
            let xml = SchemaLoader::with_default_sources().fetch(xml)?;
            let data = parse(&schema, &xml)?;
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        Command::Build {
            schema,
            json,
            options,
        } => {
            let schema = resolve(schema)?;
            let json = SchemaLoader::with_default_sources().fetch(json)?;
            let data: serde_json::Value = serde_json::from_str(&json)?;
            println!("{}", build(&schema, &data, &options.to_options())?);
            Ok(())
        }
    }
}

fn print_fields(schema: &ResolvedSchema, name: &str) -> Result<(), Box<dyn StdError>> {
    let local_name = PrefixedName::parse(name).local_name;
    let type_ = schema.find_type_by_local_name(&local_name).or_else(|| {
        schema
            .find_element_by_local_name(&local_name)
            .map(|id| schema.element(id).type_)
    });
    let Some(TypeRef::Complex(id)) = type_ else {
        return Err(format!("no complex type or element named `{name}`").into());
    };

    for field in schema.fields(id).iter() {
        println!("{}", describe(schema, field));
    }
    Ok(())
}

fn describe(schema: &ResolvedSchema, field: &Field) -> String {
    let sigil = match field.kind {
        FieldKind::Attribute => "@",
        FieldKind::Element | FieldKind::Text => "",
    };
    let mut line = format!(
        "{sigil}{}: {} [{}..{}]",
        field.key(),
        schema.type_name(field.type_),
        field.min_occurs,
        field.max_occurs
    );
    if let Some(default) = &field.default {
        line.push_str(&format!(" default={default:?}"));
    }
    if let Some(fixed) = &field.fixed {
        line.push_str(&format!(" fixed={fixed:?}"));
    }
    line
}

fn print_summary(schema: &ResolvedSchema) {
    println!(
        "target namespace: {}",
        schema.target_namespace().unwrap_or("(none)")
    );

    println!("elements:");
    for (id, element) in schema.elements() {
        let abstract_ = if element.abstract_ { " (abstract)" } else { "" };
        println!(
            "  {}: {}{abstract_}",
            element.name,
            schema.type_name(element.type_)
        );
        let substitutes = schema.substitutes(id);
        if !substitutes.is_empty() {
            let names: Vec<&str> = substitutes
                .iter()
                .map(|&member| schema.element(member).name.local_name.as_str())
                .collect();
            println!("    substitutes: {}", names.join(", "));
        }
    }

    println!("complex types:");
    for (_, complex_type) in schema.complex_types() {
        if let Some(name) = &complex_type.name {
            let base = complex_type
                .base
                .map(|base| format!(" : {}", schema.type_name(base)))
                .unwrap_or_default();
            println!("  {name}{base}");
        }
    }

    println!("simple types:");
    for (_, simple_type) in schema.simple_types() {
        if let Some(name) = &simple_type.name {
            println!("  {name}");
        }
    }
}
