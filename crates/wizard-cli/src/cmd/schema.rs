use anyhow::Result;
use clap::Args;
use wizard_spec::{definition_schema, schema::state_schema};

use crate::cmd::print_json;

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Print the schema of persisted state files instead of step definitions
    #[arg(long, default_value_t = false)]
    pub state: bool,
}

pub fn run(args: &SchemaArgs) -> Result<()> {
    let schema = if args.state {
        state_schema()
    } else {
        definition_schema()
    };
    print_json(&schema)
}
