use genepop::prelude::*;
use genepop::sampling::individuals;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use tempfile::NamedTempFile;

fn population_of(genotypes: &[(u8, u8)]) -> (NamedTempFile, GenepopSource) {
    let mut text = String::from("generated\nlocus\npop\n");
    for (i, (a, b)) in genotypes.iter().enumerate() {
        text.push_str(&format!("ind{}, {:02}{:02}\n", i + 1, a, b));
    }
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    let source = GenepopSource::open(file.path()).unwrap();
    (file, source)
}

fn population_of_size(size: usize) -> (NamedTempFile, GenepopSource) {
    population_of(&vec![(1, 1); size])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn proportion_never_exceeds_population(size in 1usize..40, proportion in 0.0f64..2.0, seed: u64) {
        let (_file, source) = population_of_size(size);
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(seed);
        individuals::by_proportion(&source, &mut registry, proportion, "p", &mut rng).unwrap();

        let expected = ((size as f64 * proportion).round() as usize).min(size);
        let selected = registry.individuals("p").unwrap().selected(1);
        prop_assert_eq!(selected.len(), expected);
        prop_assert!(selected.iter().all(|i| (1..=size).contains(i)));
    }

    #[test]
    fn removing_at_least_everyone_empties(size in 1usize..30, extra in 0usize..5, seed: u64) {
        let (_file, source) = population_of_size(size);
        let mut registry = SubsampleRegistry::new();
        let mut rng = StdRng::seed_from_u64(seed);
        individuals::remove_n(&source, &mut registry, size + extra, "n", &mut rng).unwrap();
        prop_assert_eq!(registry.individuals("n").unwrap().numbers(1), &[0][..]);
    }

    #[test]
    fn stored_individuals_keep_sentinel_and_order(numbers in proptest::collection::vec(1usize..500, 0..60)) {
        let mut view = IndividualSubsample::new();
        view.insert(1, numbers.clone());
        let stored = view.numbers(1);

        prop_assert!(!stored.is_empty());
        prop_assert_eq!(stored[0], 0);
        prop_assert!(stored.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(view.selected(1).len(), stored.len() - 1);
        prop_assert!(numbers.iter().all(|n| stored.contains(n)));
    }

    #[test]
    fn heterozygosity_in_unit_range(genotypes in proptest::collection::vec((0u8..6, 0u8..6), 1..25)) {
        let (_file, source) = population_of(&genotypes);
        let he = source
            .expected_heterozygosity(&SubsampleRegistry::new(), &Selection::new(), &StatsOptions::new())
            .unwrap();

        let typed: Vec<u8> = genotypes
            .iter()
            .filter(|(a, b)| *a != 0 && *b != 0)
            .flat_map(|&(a, b)| vec![a, b])
            .collect();
        match he[&1].get(&1) {
            None => prop_assert!(typed.is_empty()),
            Some(&value) => {
                prop_assert!((0.0..1.0).contains(&value));
                if typed.iter().all(|&a| a == typed[0]) {
                    prop_assert!(value.abs() < 1e-12);
                }
            }
        }
    }
}
