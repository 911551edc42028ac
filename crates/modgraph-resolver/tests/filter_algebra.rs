use modgraph_core::identity::ModuleIdentity;
use modgraph_core::metadata::ExcludeRule;
use modgraph_resolver::filter::{ModuleExclusions, ModuleResolutionFilter};

fn filters() -> Vec<ModuleResolutionFilter> {
    let rules: Vec<Vec<ExcludeRule>> = vec![
        vec![],
        vec![ExcludeRule::group("org")],
        vec![ExcludeRule::module_name("a")],
        vec![ExcludeRule::module("org", "a")],
        vec![ExcludeRule::module("net", "b"), ExcludeRule::group("com")],
        vec![ExcludeRule::group("org.*").glob()],
        vec![ExcludeRule::module_name("*-api").glob()],
        vec![ExcludeRule::artifact("a", Some("jar"), None)],
        vec![ExcludeRule::default()],
    ];
    let mut filters: Vec<ModuleResolutionFilter> = rules
        .iter()
        .map(|r| ModuleResolutionFilter::from_rules(r).unwrap())
        .collect();
    filters.push(ModuleResolutionFilter::exclude_all());
    filters
}

fn modules() -> Vec<ModuleIdentity> {
    [
        ("org", "a"),
        ("org", "b"),
        ("org.sub", "a"),
        ("net", "a"),
        ("net", "b"),
        ("com", "x-api"),
        ("org", "x-api"),
        ("io", "c"),
    ]
    .into_iter()
    .map(|(g, n)| ModuleIdentity::new(g, n))
    .collect()
}

#[test]
fn union_accepts_what_either_accepts() {
    let modules = modules();
    for a in filters() {
        for b in filters() {
            let union = a.union(&b);
            for m in &modules {
                assert_eq!(union.accepts(m), a.accepts(m) || b.accepts(m), "{a:?} | {b:?} on {m}");
            }
        }
    }
}

#[test]
fn intersection_accepts_what_both_accept() {
    let modules = modules();
    for a in filters() {
        for b in filters() {
            let both = a.intersect(&b);
            for m in &modules {
                assert_eq!(both.accepts(m), a.accepts(m) && b.accepts(m), "{a:?} & {b:?} on {m}");
            }
        }
    }
}

#[test]
fn operations_commute_and_associate() {
    let modules = modules();
    let all = filters();
    for a in &all {
        for b in &all {
            for m in &modules {
                assert_eq!(a.union(b).accepts(m), b.union(a).accepts(m));
                assert_eq!(a.intersect(b).accepts(m), b.intersect(a).accepts(m));
            }
            for c in &all {
                let left = a.union(b).union(c);
                let right = a.union(&b.union(c));
                let left_i = a.intersect(b).intersect(c);
                let right_i = a.intersect(&b.intersect(c));
                for m in &modules {
                    assert_eq!(left.accepts(m), right.accepts(m));
                    assert_eq!(left_i.accepts(m), right_i.accepts(m));
                }
            }
        }
    }
}

#[test]
fn every_filter_matches_itself() {
    for a in filters() {
        assert!(a.accepts_same_modules_as(&a));
        assert!(a.accepts_same_modules_as(&a.clone()));
    }
}

#[test]
fn artifact_rules_never_exclude_modules() {
    let filter = ModuleResolutionFilter::from_rules(&[ExcludeRule::artifact("a", None, None)]).unwrap();
    for m in modules() {
        assert!(filter.accepts(&m));
    }
}

#[test]
fn factory_memoizes_equal_rule_lists() {
    let mut exclusions = ModuleExclusions::new();
    let rules = [ExcludeRule::group("org"), ExcludeRule::module("net", "b")];
    let first = exclusions.exclude_any(&rules).unwrap();
    let second = exclusions.exclude_any(&rules).unwrap();
    assert_eq!(first, second);

    let union = exclusions.union(&first, &ModuleResolutionFilter::accept_all());
    assert!(union.is_accept_all());
    let intersect = exclusions.intersect(&first, &ModuleResolutionFilter::accept_all());
    assert!(intersect.accepts_same_modules_as(&first));
}

#[test]
fn malformed_rules_are_rejected() {
    let bad = ExcludeRule {
        group: Some("[unclosed".into()),
        ..ExcludeRule::default()
    }
    .glob();
    assert!(ModuleResolutionFilter::from_rules(&[bad]).is_err());
}
