//! `rm-bridge changeset`: print change sets without writing or applying.

use anyhow::{bail, Context, Result};
use clap::Args;
use rmbridge_changeset::pipeline;

use super::{print_errors, InputArgs};

#[derive(Args, Debug)]
pub struct ChangesetArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

impl ChangesetArgs {
    pub fn run(self) -> Result<()> {
        let inputs = self.input.load()?;
        let changes = pipeline::run(
            &inputs.model,
            &inputs.config,
            &inputs.snapshot,
            self.input.options(),
        );

        for change in &changes {
            let change_set = &change.change_set;
            let yaml = change_set
                .to_yaml()
                .with_context(|| format!("failed to render change set of '{}'", change_set.module_id))?;
            println!("# {}", change_set.module_id);
            print!("{yaml}");
        }

        print_errors(&changes);
        if pipeline::has_errors(&changes) {
            bail!("errors occurred while calculating change sets");
        }
        Ok(())
    }
}
