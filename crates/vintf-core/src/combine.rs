//! Combining framework matrix fragments into the matrix a device is held to.

use thiserror::Error;
use tracing::debug;
use vintf_schema::{CompatibilityMatrix, Level, MatrixKernel, SchemaError, SchemaType};

/// An object tagged with where it came from, usually a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Named<T> {
    pub name: String,
    pub object: T,
}

impl<T> Named<T> {
    pub fn new(name: impl Into<String>, object: T) -> Self {
        Self {
            name: name.into(),
            object,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombineError {
    #[error("cannot combine framework matrices for a device with an unspecified level")]
    UnspecifiedLevel,
    #[error("'{name}' is a {actual} matrix; only framework matrices can be combined")]
    NotFramework { name: String, actual: SchemaType },
    #[error("'{name}' has no level but declares HALs or xmlfiles")]
    NonEmptyBase { name: String },
    #[error("'{first}' and '{second}' both have no level; at most one base matrix is allowed")]
    MultipleBases { first: String, second: String },
    #[error("'{name}' cannot be added: {source}")]
    Conflict {
        name: String,
        #[source]
        source: SchemaError,
    },
}

fn conflict(name: &str) -> impl FnOnce(SchemaError) -> CombineError + '_ {
    move |source| CombineError::Conflict {
        name: name.to_owned(),
        source,
    }
}

/// Combine framework matrix fragments for a device at `device_level`.
///
/// The single fragment without a level is the base; one is synthesized when
/// absent. Fragments at `device_level` are merged as mandatory, fragments at
/// higher levels are absorbed as optional, and fragments below it are
/// ignored. Kernel requirements come from the base and from fragments at
/// `device_level` only.
///
/// The result does not depend on the order of `fragments`: they are
/// processed sorted by level and then by name.
pub fn combine(
    device_level: Level,
    mut fragments: Vec<Named<CompatibilityMatrix>>,
) -> Result<CompatibilityMatrix, CombineError> {
    if !device_level.is_specified() {
        return Err(CombineError::UnspecifiedLevel);
    }
    if let Some(bad) = fragments
        .iter()
        .find(|f| f.object.schema_type() != SchemaType::Framework)
    {
        return Err(CombineError::NotFramework {
            name: bad.name.clone(),
            actual: bad.object.schema_type(),
        });
    }
    fragments.sort_by(|a, b| (a.object.level, &a.name).cmp(&(b.object.level, &b.name)));

    let mut base: Option<Named<CompatibilityMatrix>> = None;
    let mut leveled = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        if fragment.object.level.is_specified() {
            leveled.push(fragment);
            continue;
        }
        if !fragment.object.hals().is_empty() || !fragment.object.xml_files().is_empty() {
            return Err(CombineError::NonEmptyBase {
                name: fragment.name,
            });
        }
        if let Some(existing) = &base {
            return Err(CombineError::MultipleBases {
                first: existing.name.clone(),
                second: fragment.name,
            });
        }
        base = Some(fragment);
    }

    let mut combined = match base {
        Some(base) => {
            debug!("using {} as the base matrix", base.name);
            base.object
        }
        None => CompatibilityMatrix::framework(),
    }
    .with_level(device_level);

    let mut kernels: Vec<(String, MatrixKernel)> = Vec::new();
    let mut newer = Vec::new();
    for mut fragment in leveled {
        if fragment.object.level == device_level {
            debug!("merging {} as mandatory", fragment.name);
            kernels.extend(
                fragment
                    .object
                    .take_kernels()
                    .into_iter()
                    .map(|k| (fragment.name.clone(), k)),
            );
            combined
                .add_all_hals(fragment.object)
                .map_err(conflict(&fragment.name))?;
        } else if fragment.object.level > device_level {
            newer.push(fragment);
        } else {
            debug!(
                "skipping {} at level {} below device level {device_level}",
                fragment.name, fragment.object.level
            );
        }
    }

    for fragment in newer {
        debug!(
            "absorbing {} HALs from {} (level {}) as optional",
            fragment.object.hals().len(),
            fragment.name,
            fragment.object.level
        );
        combined
            .add_all_hals_as_optional(fragment.object)
            .map_err(conflict(&fragment.name))?;
    }

    for (name, kernel) in kernels {
        combined.add_kernel(kernel).map_err(conflict(&name))?;
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vintf_schema::{HalFormat, KernelVersion, MatrixHal, Sepolicy};

    fn hal(name: &str, range: &str, instance: &str) -> MatrixHal {
        MatrixHal::new(HalFormat::Hidl, name)
            .with_range(range.parse().unwrap())
            .with_instance("IFoo", instance)
    }

    fn fragment(name: &str, level: u64, hals: Vec<MatrixHal>) -> Named<CompatibilityMatrix> {
        let mut matrix = CompatibilityMatrix::framework().with_level(Level::new(level));
        for h in hals {
            matrix.add_hal(h);
        }
        Named::new(name, matrix)
    }

    fn base() -> Named<CompatibilityMatrix> {
        let mut matrix = CompatibilityMatrix::framework();
        matrix.framework_info_mut().unwrap().sepolicy =
            Sepolicy::new(30, vec!["26.0".parse().unwrap()]);
        Named::new("compatibility_matrix.empty.xml", matrix)
    }

    fn with_kernel(mut f: Named<CompatibilityMatrix>, version: &str) -> Named<CompatibilityMatrix> {
        f.object
            .add_kernel(MatrixKernel::new(version.parse().unwrap(), Vec::new()))
            .unwrap();
        f
    }

    #[test]
    fn base_only_keeps_base_with_device_level() {
        let combined = combine(Level::new(3), vec![base()]).unwrap();
        let mut expected = base().object;
        expected.level = Level::new(3);
        assert_eq!(combined, expected);
        assert!(combined.hals().is_empty());
    }

    #[test]
    fn base_is_synthesized_when_missing() {
        let combined = combine(Level::new(2), vec![fragment("2.xml", 2, vec![hal("a", "1.0", "default")])]).unwrap();
        assert_eq!(combined.level, Level::new(2));
        assert_eq!(combined.hals().len(), 1);
    }

    #[test]
    fn unspecified_device_level_is_rejected() {
        assert_eq!(
            combine(Level::UNSPECIFIED, vec![base()]),
            Err(CombineError::UnspecifiedLevel)
        );
    }

    #[test]
    fn base_with_hals_is_rejected() {
        let mut bad = base();
        bad.object.add_hal(hal("a", "1.0", "default"));
        assert!(matches!(
            combine(Level::new(1), vec![bad]),
            Err(CombineError::NonEmptyBase { .. })
        ));
    }

    #[test]
    fn two_bases_are_rejected() {
        let mut other = base();
        other.name = "other.xml".to_owned();
        let err = combine(Level::new(1), vec![base(), other]).unwrap_err();
        assert!(matches!(err, CombineError::MultipleBases { .. }));
    }

    #[test]
    fn device_matrix_fragments_are_rejected() {
        let device = Named::new("device.xml", CompatibilityMatrix::device());
        assert!(matches!(
            combine(Level::new(1), vec![device]),
            Err(CombineError::NotFramework { .. })
        ));
    }

    #[test]
    fn same_level_conflict_names_the_fragment() {
        let a = fragment("a.xml", 3, vec![hal("android.hardware.foo", "1.0", "default")]);
        let b = fragment("b.xml", 3, vec![hal("android.hardware.foo", "1.2", "default")]);
        let err = combine(Level::new(3), vec![a, b]).unwrap_err();
        match err {
            CombineError::Conflict { name, source } => {
                assert_eq!(name, "b.xml");
                assert_eq!(
                    source,
                    SchemaError::DuplicateMajor {
                        name: "android.hardware.foo".to_owned()
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn newer_levels_are_absorbed_as_optional() {
        let current = fragment("3.xml", 3, vec![hal("android.hardware.foo", "1.0", "default")]);
        let newer = fragment(
            "4.xml",
            4,
            vec![
                hal("android.hardware.foo", "1.0-2", "default"),
                hal("android.hardware.foo", "2.0", "default"),
                hal("android.hardware.bar", "1.0", "default"),
            ],
        );
        let older = fragment("2.xml", 2, vec![hal("android.hardware.old", "1.0", "default")]);
        let combined = combine(Level::new(3), vec![newer, older, current]).unwrap();

        let foo = combined.hals().get_all("android.hardware.foo");
        assert_eq!(foo.len(), 2);
        let required = foo.iter().find(|h| !h.optional).unwrap();
        assert_eq!(required.version_ranges, vec!["1.0-2".parse().unwrap()]);
        let optional = foo.iter().find(|h| h.optional).unwrap();
        assert_eq!(optional.version_ranges, vec!["2.0".parse().unwrap()]);
        assert!(combined.hals().get_all("android.hardware.bar")[0].optional);
        assert!(!combined.hals().contains("android.hardware.old"));
    }

    #[test]
    fn required_hal_must_cover_newer_instances() {
        let current = fragment("3.xml", 3, vec![hal("android.hardware.foo", "1.0", "default")]);
        let newer = fragment("4.xml", 4, vec![hal("android.hardware.foo", "1.1", "slot1")]);
        let err = combine(Level::new(3), vec![current, newer]).unwrap_err();
        assert!(matches!(
            err,
            CombineError::Conflict {
                source: SchemaError::RequiredInstanceMismatch { .. },
                ..
            }
        ));
        assert!(err.to_string().contains("4.xml"));
    }

    #[test]
    fn combination_is_order_independent() {
        let fragments = || {
            vec![
                base(),
                fragment("a.xml", 3, vec![hal("android.hardware.a", "1.0", "default")]),
                fragment("b.xml", 3, vec![hal("android.hardware.b", "2.0-1", "default")]),
                fragment("c.xml", 4, vec![hal("android.hardware.c", "1.0-3", "default")]),
                fragment("d.xml", 4, vec![hal("android.hardware.c", "1.2-5", "default")]),
                fragment("e.xml", 5, vec![hal("android.hardware.a", "1.0-4", "default")]),
            ]
        };
        let forward = combine(Level::new(3), fragments()).unwrap();
        let mut reversed_input = fragments();
        reversed_input.reverse();
        let reversed = combine(Level::new(3), reversed_input).unwrap();
        assert_eq!(forward, reversed);

        let c = &forward.hals().get_all("android.hardware.c")[0];
        assert_eq!(c.version_ranges, vec!["1.0-5".parse().unwrap()]);
        let a = &forward.hals().get_all("android.hardware.a")[0];
        assert!(!a.optional);
        assert_eq!(a.version_ranges, vec!["1.0-4".parse().unwrap()]);
    }

    #[test]
    fn kernels_come_from_the_device_level_only() {
        let current = with_kernel(fragment("3.xml", 3, Vec::new()), "4.9.0");
        let newer = with_kernel(fragment("4.xml", 4, Vec::new()), "4.14.0");
        let combined = combine(Level::new(3), vec![base(), current, newer]).unwrap();
        let kernels = combined.kernels().unwrap();
        assert_eq!(kernels.len(), 1);
        assert_eq!(kernels[0].min_lts, KernelVersion::new(4, 9, 0));
    }

    #[test]
    fn duplicate_kernels_across_fragments_conflict() {
        let a = with_kernel(fragment("a.xml", 3, Vec::new()), "4.9.0");
        let b = with_kernel(fragment("b.xml", 3, Vec::new()), "4.9.0");
        let err = combine(Level::new(3), vec![a, b]).unwrap_err();
        assert!(matches!(
            err,
            CombineError::Conflict {
                source: SchemaError::DuplicateKernel { .. },
                ..
            }
        ));
    }
}
