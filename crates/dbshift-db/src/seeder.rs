use dbshift_common::{Error, Result};
use tracing::info;

use crate::discovery::discover;
use crate::migrator::Migrator;
use crate::unit::Seeder;

impl Migrator {
    /// Run seeder `name`, or every seeder in directory order when `name` is
    /// `None` or empty. Seeders are never recorded, so each call runs them
    /// again in full. Stops at the first failure.
    pub fn seed(&self, name: Option<&str>) -> Result<Vec<String>> {
        let dir = self.config().seeders_dir();
        let available = discover(&dir)?;

        let selected = match name.filter(|n| !n.is_empty()) {
            Some(name) => {
                if !available.iter().any(|known| known == name) {
                    return Err(Error::Usage(format!("unknown seeder '{name}'")));
                }
                vec![name.to_string()]
            }
            None => available,
        };

        for name in &selected {
            let seeder = self.loader().seeder(&dir, name)?;
            self.run(seeder.as_ref(), name)?;
        }

        info!("seed: {} seeder(s) run", selected.len());
        Ok(selected)
    }

    /// Run one already-resolved seeder.
    pub fn run(&self, seeder: &dyn Seeder, name: &str) -> Result<()> {
        self.reporter().success(&format!("{name}: seeding..."));
        let conn = self.connection()?;
        seeder.run(&conn)
    }
}
