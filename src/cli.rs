// src/cli.rs
// =============================================================================
// Command-line interface, defined with clap's derive API.
//
// Subcommands:
// - filter: embed activities into one or more documents
// - index:  show the phrase list the filter would use
// - embed:  prepare a single activity, like the LMS embed endpoint does
//
// Course data comes from a JSON manifest (see host/manifest.rs).
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::host::ContextLevel;
use crate::source::InputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "hvp-autoembed",
    version = "0.1.0",
    about = "Embed H5P activities wherever their names appear in course text",
    long_about = "hvp-autoembed scans HTML or markdown for the names of H5P activities in a course \
                  and replaces each name with an embedded player, the way the LMS text filter does."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Which course and viewer the text is rendered for
#[derive(Args, Debug)]
pub struct CourseArgs {
    /// Course manifest (JSON) describing modules, contents and settings
    #[arg(long)]
    pub manifest: PathBuf,

    /// Course id the text belongs to
    #[arg(long)]
    pub course: u64,

    /// Id of the user viewing the text
    #[arg(long)]
    pub user: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter documents and print the result
    ///
    /// Example: hvp-autoembed filter --manifest course.json --course 2 --user 5 page.html
    Filter {
        #[command(flatten)]
        course: CourseArgs,

        /// The text belongs to this activity (it won't embed itself)
        #[arg(long)]
        module: Option<u64>,

        /// How to read the inputs
        #[arg(long, value_enum, default_value_t = InputFormat::Html)]
        format: InputFormat,

        /// Output results in JSON format
        #[arg(long)]
        json: bool,

        /// Files, http(s) URLs, or "-" for stdin
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Print the activity index for a course and viewer
    Index {
        #[command(flatten)]
        course: CourseArgs,

        /// Output results in JSON format instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Prepare one activity for embedding and print its content id
    ///
    /// Example: hvp-autoembed embed --manifest course.json 7
    Embed {
        /// Course manifest (JSON)
        #[arg(long)]
        manifest: PathBuf,

        /// Course module id of the activity
        cmid: u64,
    },
}

impl CourseArgs {
    // Text for a specific activity lives in that activity's context
    pub fn context_level(&self, module: Option<u64>) -> ContextLevel {
        match module {
            Some(cmid) => ContextLevel::Module {
                course_id: self.course,
                cmid,
            },
            None => ContextLevel::Course {
                course_id: self.course,
            },
        }
    }
}
