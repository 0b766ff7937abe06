//! Sources for the request bodies of `create` actions.

use std::fmt;

use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};
use serde_json::{Value, json};

/// Produces the JSON body of a newly created record.
pub trait RecordSource: fmt::Debug + Send + Sync {
    /// Generates a new record.
    fn record(&self, rng: &mut dyn RngCore) -> Value;
}

const FIRST_NAMES: &[&str] = &[
    "Ana", "Beatriz", "Carlos", "Daniela", "Eduardo", "Fernanda", "Gabriel", "Helena", "Igor",
    "Julia", "Lucas", "Mariana", "Pedro", "Rafaela", "Thiago", "Vitoria",
];

const LAST_NAMES: &[&str] = &[
    "Almeida", "Barbosa", "Cardoso", "Costa", "Ferreira", "Gomes", "Lima", "Martins", "Oliveira",
    "Pereira", "Ribeiro", "Rocha", "Santos", "Silva", "Souza",
];

const STREETS: &[&str] = &[
    "Rua das Flores",
    "Avenida Paulista",
    "Rua do Comercio",
    "Travessa da Paz",
    "Alameda Santos",
    "Rua XV de Novembro",
];

const CITIES: &[&str] = &[
    "Belo Horizonte",
    "Curitiba",
    "Fortaleza",
    "Porto Alegre",
    "Recife",
    "Salvador",
    "Sao Paulo",
];

/// Length of generated telephone numbers, the target service rejects longer ones.
const TELEPHONE_DIGITS: usize = 10;

/// Generates owner records with `firstName`, `lastName`, `address`, `city` and `telephone`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OwnerRecords;

impl RecordSource for OwnerRecords {
    fn record(&self, rng: &mut dyn RngCore) -> Value {
        let telephone: String = (0..TELEPHONE_DIGITS)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();

        json!({
            "firstName": pick(FIRST_NAMES, rng),
            "lastName": pick(LAST_NAMES, rng),
            "address": format!("{}, {}", pick(STREETS, rng), rng.random_range(1..2000u32)),
            "city": pick(CITIES, rng),
            "telephone": telephone,
        })
    }
}

fn pick(pool: &[&'static str], rng: &mut dyn RngCore) -> &'static str {
    pool.choose(rng).copied().unwrap_or_default()
}
