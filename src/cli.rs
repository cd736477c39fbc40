use clap::{ArgAction, Parser, Subcommand};

use xsd_codec::BuildOptions;

#[derive(Parser)]
#[clap(version, about)]
pub struct Cli {
    #[clap(
        long,
        global = true,
        help = "Allow a XML Document Type Definition (DTD) to occur"
    )]
    pub allow_dtd: bool,

    #[clap(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Log more details; repeat for even more"
    )]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the effective fields of a complex type
    Fields {
        #[clap(help = "The schema file or URL")]
        schema: String,
        #[clap(help = "Name of a complex type, or of an element with a complex type")]
        type_name: String,
    },
    /// Print a summary of the resolved schema
    Resolve {
        #[clap(help = "The schema file or URL")]
        schema: String,
    },
    /// Read an XML document and print its data as JSON
    Parse {
        #[clap(help = "The schema file or URL")]
        schema: String,
        #[clap(help = "The XML document file or URL")]
        xml: String,
    },
    /// Write JSON data as an XML document
    Build {
        #[clap(help = "The schema file or URL")]
        schema: String,
        #[clap(help = "The JSON data file or URL")]
        json: String,
        #[clap(flatten)]
        options: BuildArgs,
    },
}

#[derive(clap::Args)]
pub struct BuildArgs {
    #[clap(long, help = "Local name of the root element")]
    pub root: Option<String>,

    #[clap(long, help = "Prefix for the root element's namespace")]
    pub prefix: Option<String>,

    #[clap(long, help = "Indent nested elements")]
    pub pretty: bool,

    #[clap(long, help = "Omit the XML declaration")]
    pub no_xml_decl: bool,

    #[clap(long, default_value = "utf-8", help = "Encoding named in the XML declaration")]
    pub encoding: String,
}

impl BuildArgs {
    pub fn to_options(&self) -> BuildOptions {
        let mut options = BuildOptions::new()
            .xml_decl(!self.no_xml_decl)
            .encoding(self.encoding.as_str())
            .pretty(self.pretty);
        if let Some(root) = &self.root {
            options = options.root_element(root.as_str());
        }
        if let Some(prefix) = &self.prefix {
            options = options.prefix(prefix.as_str());
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_build_flags_to_options() {
        let cli = Cli::parse_from([
            "xsd-codec",
            "build",
            "main.xsd",
            "data.json",
            "--root",
            "order",
            "--no-xml-decl",
            "--pretty",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Build { options, .. } = cli.command else {
            panic!("expected the build command");
        };
        let options = options.to_options();
        assert!(!options.xml_decl);
        assert!(options.pretty);
        assert_eq!(options.root_element.as_deref(), Some("order"));
        assert_eq!(options.prefix, None);
        assert_eq!(options.encoding, "utf-8");
    }

    #[test]
    fn verifies_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
