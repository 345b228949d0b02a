// ABOUTME: The credhub job: validation units, application documents, config files and scripts
// ABOUTME: Units are registered in the order an operator reads them in the job spec

pub mod application;
pub mod bbr;
pub mod configurator;
pub mod files;
pub mod scripts;
pub mod validation;

pub use configurator::LEGACY_APPLICATION_PATH;

use super::RenderUnit;

pub const JOB: &str = "credhub";

pub fn units() -> Vec<Box<dyn RenderUnit>> {
    let mut units: Vec<Box<dyn RenderUnit>> = vec![
        Box::new(validation::DataStorageValidation),
        Box::new(validation::EncryptionValidation),
        Box::new(validation::AuthorizationValidation),
        Box::new(validation::LoggingValidation),
        Box::new(validation::UaaValidation),
    ];

    for document in application::documents() {
        units.push(Box::new(document));
    }
    units.push(Box::new(configurator::LegacyApplicationFile));

    units.push(Box::new(files::Log4jProperties));
    units.push(Box::new(files::EncryptionConf));
    units.push(Box::new(files::DatabaseCa));
    units.push(Box::new(files::BpmConfig));

    units.push(Box::new(scripts::PreStart));
    units.push(Box::new(scripts::InitKeyStores));
    units.push(Box::new(scripts::ConfigureHsm));
    units.push(Box::new(scripts::StartServer));
    units.push(Box::new(scripts::WaitForUaa));

    units.push(Box::new(bbr::Metadata));
    units.push(Box::new(bbr::Backup));
    units.push(Box::new(bbr::Restore));

    units
}
