//! Locally generated dataset shown when the dashboard is opened without an
//! `empresa_id`. Deterministic, so the page looks the same on every load.

use crate::models::{CategoryKey, DashData, Franchise};

struct SampleFranchise {
    id: &'static str,
    nome: &'static str,
    receita: f64,
    objetos: f64,
    despesas: [(CategoryKey, f64); 7],
}

const SAMPLES: [SampleFranchise; 4] = [
    SampleFranchise {
        id: "cl",
        nome: "Campo Limpo",
        receita: 52_000.0,
        objetos: 12_300.0,
        despesas: [
            (CategoryKey::Aluguel, 4_000.0),
            (CategoryKey::Comissoes, 2_500.0),
            (CategoryKey::Extras, 1_000.0),
            (CategoryKey::FolhaPagamento, 18_000.0),
            (CategoryKey::Impostos, 5_000.0),
            (CategoryKey::Veiculos, 6_000.0),
            (CategoryKey::Telefone, 500.0),
        ],
    },
    SampleFranchise {
        id: "rp",
        nome: "Republica",
        receita: 75_000.0,
        objetos: 18_500.0,
        despesas: [
            (CategoryKey::Aluguel, 8_000.0),
            (CategoryKey::Comissoes, 4_000.0),
            (CategoryKey::Extras, 1_500.0),
            (CategoryKey::FolhaPagamento, 25_000.0),
            (CategoryKey::Impostos, 7_500.0),
            (CategoryKey::Veiculos, 8_000.0),
            (CategoryKey::Telefone, 700.0),
        ],
    },
    SampleFranchise {
        id: "sj",
        nome: "São Jorge",
        receita: 48_000.0,
        objetos: 11_000.0,
        despesas: [
            (CategoryKey::Aluguel, 3_500.0),
            (CategoryKey::Comissoes, 2_200.0),
            (CategoryKey::Extras, 800.0),
            (CategoryKey::FolhaPagamento, 17_000.0),
            (CategoryKey::Impostos, 4_800.0),
            (CategoryKey::Veiculos, 5_500.0),
            (CategoryKey::Telefone, 450.0),
        ],
    },
    SampleFranchise {
        id: "jm",
        nome: "Jd. Marajoara",
        receita: 61_000.0,
        objetos: 15_000.0,
        despesas: [
            (CategoryKey::Aluguel, 5_500.0),
            (CategoryKey::Comissoes, 3_000.0),
            (CategoryKey::Extras, 1_200.0),
            (CategoryKey::FolhaPagamento, 21_000.0),
            (CategoryKey::Impostos, 6_000.0),
            (CategoryKey::Veiculos, 7_000.0),
            (CategoryKey::Telefone, 600.0),
        ],
    },
];

/// Month-over-month volume factors for January through June.
const MONTH_FACTORS: [f64; 6] = [0.85, 0.92, 1.0, 1.02, 1.15, 0.97];

/// Six months of sample figures for `year`.
pub fn sample_dash_data(year: i32) -> DashData {
    let agfs = SAMPLES
        .iter()
        .map(|s| Franchise {
            id: s.id.to_string(),
            nome: s.nome.to_string(),
        })
        .collect();
    let mut data = DashData::with_franchises(agfs);

    for (index, factor) in MONTH_FACTORS.iter().enumerate() {
        let month = index as u32 + 1;
        // Costs move half as much as volume.
        let cost_factor = 1.0 + (factor - 1.0) / 2.0;

        for sample in &SAMPLES {
            let cell = data.cell_mut(year, month, sample.nome);
            cell.receita = (sample.receita * factor).round();
            cell.objetos = (sample.objetos * factor).round();
            for (key, amount) in sample.despesas {
                cell.despesas.set(key, (amount * cost_factor).round());
            }
            cell.despesa_total = cell.despesas.sum();
        }
    }

    data
}
