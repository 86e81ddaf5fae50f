//! Compiled contracts as produced by Hardhat.
//!
//! An artifact is looked up by contract name below an artifacts directory.
//! Versions map to sub directories (`<root>/<version>/**/<Name>.json`) or,
//! when no such directory exists, to an optional `version` field inside the
//! artifact file. The version `latest` picks the highest numeric version
//! found under the root and only falls back to an unversioned artifact when
//! there is no versioned one.

use {
    crate::traits::ArtifactSource,
    alloy::{
        dyn_abi::{DynSolValue, Specifier},
        json_abi::JsonAbi,
        primitives::Bytes,
    },
    serde::Deserialize,
    std::{
        collections::BTreeMap,
        path::{Component, Path, PathBuf},
    },
};

/// Version that selects the newest artifact.
pub const LATEST: &str = "latest";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact {name}@{version} not found")]
    NotFound { name: String, version: String },
    #[error("artifact {name}@{version} is ambiguous: {paths:?}")]
    Ambiguous {
        name: String,
        version: String,
        paths: Vec<PathBuf>,
    },
    #[error("invalid artifact version {0:?}")]
    InvalidVersion(String),
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed artifact {path:?}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact {0} links libraries that are not deployed by this tool")]
    UnlinkedLibraries(String),
    #[error("artifact {0} has no creation bytecode (abstract contract or interface?)")]
    NotDeployable(String),
    #[error("constructor takes {expected} arguments but {actual} were given")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("unsupported constructor parameter {name}")]
    Abi {
        name: String,
        #[source]
        source: alloy::dyn_abi::Error,
    },
    #[error("cannot use {value:?} as constructor argument {name}")]
    Argument {
        name: String,
        value: String,
        #[source]
        source: alloy::dyn_abi::Error,
    },
}

/// A contract ready to be deployed.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    pub name: String,
    /// The version the artifact was resolved with, if it declares one.
    pub version: Option<String>,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl Artifact {
    /// Creation code followed by the ABI encoded constructor arguments.
    pub fn deploy_code(&self, args: &[String]) -> Result<Bytes, ArtifactError> {
        let params = self
            .abi
            .constructor()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default();
        if params.len() != args.len() {
            return Err(ArtifactError::ArgumentCount {
                expected: params.len(),
                actual: args.len(),
            });
        }

        let values = params
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let ty = param.resolve().map_err(|source| ArtifactError::Abi {
                    name: param.name.clone(),
                    source,
                })?;
                ty.coerce_str(arg).map_err(|source| ArtifactError::Argument {
                    name: param.name.clone(),
                    value: arg.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut code = self.bytecode.to_vec();
        if !values.is_empty() {
            code.extend(DynSolValue::Tuple(values).abi_encode_params());
        }
        Ok(code.into())
    }
}

/// Layout of a Hardhat artifact file. Fields not needed for deployment are
/// ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    abi: JsonAbi,
    // Kept as text: unlinked bytecode contains placeholders that are not hex.
    bytecode: String,
    #[serde(default)]
    link_references: BTreeMap<String, serde_json::Value>,
    version: Option<String>,
}

struct Candidate {
    path: PathBuf,
    version: Option<String>,
    artifact: HardhatArtifact,
}

impl Candidate {
    fn order(&self) -> Option<Vec<u64>> {
        self.version.as_deref().and_then(version_order)
    }
}

/// Orderable form of numeric versions like `1.2.0` or `v2`.
fn version_order(version: &str) -> Option<Vec<u64>> {
    let version = version.strip_prefix('v').unwrap_or(version);
    version.split('.').map(|part| part.parse().ok()).collect()
}

/// Versions name a directory right below the root and nothing else.
fn is_plain_version(version: &str) -> bool {
    let mut components = Path::new(version).components();
    !version.contains(['/', '\\'])
        && matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        )
}

/// Picks the single matching candidate. For `latest` only the candidates
/// with the highest version compete. On failure the paths of all remaining
/// candidates are returned.
fn select(mut candidates: Vec<Candidate>, latest: bool) -> Result<Candidate, Vec<PathBuf>> {
    let newest = candidates
        .iter()
        .filter_map(Candidate::order)
        .max()
        .filter(|_| latest);
    if let Some(newest) = newest {
        candidates.retain(|candidate| candidate.order().as_ref() == Some(&newest));
    }
    if candidates.len() == 1 {
        return Ok(candidates.remove(0));
    }
    Err(candidates
        .into_iter()
        .map(|candidate| candidate.path)
        .collect())
}

/// [`ArtifactSource`] reading Hardhat's `artifacts/` directory.
#[derive(Clone, Debug)]
pub struct HardhatArtifacts {
    root: PathBuf,
}

impl HardhatArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Finds every `<name>.json` below `dir`, skipping debug files and
    /// compiler inputs.
    async fn find(&self, dir: &Path, name: &str) -> Result<Vec<PathBuf>, ArtifactError> {
        let file_name = format!("{name}.json");
        let mut found = Vec::new();
        let mut dirs = vec![dir.to_owned()];
        while let Some(dir) = dirs.pop() {
            let io = |source| ArtifactError::Io {
                path: dir.clone(),
                source,
            };
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(io)?;
            while let Some(entry) = entries.next_entry().await.map_err(io)? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(io)?;
                if file_type.is_dir() {
                    if entry.file_name() != "build-info" {
                        dirs.push(path);
                    }
                } else if entry.file_name() == file_name.as_str() {
                    found.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }

    /// The version directory `path` is stored in, if any.
    fn version_dir(&self, path: &Path) -> Option<String> {
        match path.strip_prefix(&self.root).ok()?.components().next()? {
            Component::Normal(dir) => dir
                .to_str()
                .filter(|dir| version_order(dir).is_some())
                .map(str::to_owned),
            _ => None,
        }
    }

    async fn read(path: &Path) -> Result<HardhatArtifact, ArtifactError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.to_owned(),
                source,
            })?;
        serde_json::from_slice(&data).map_err(|source| ArtifactError::Malformed {
            path: path.to_owned(),
            source,
        })
    }
}

#[async_trait::async_trait]
impl ArtifactSource for HardhatArtifacts {
    async fn load(&self, name: &str, version: &str) -> Result<Artifact, ArtifactError> {
        if !is_plain_version(version) {
            return Err(ArtifactError::InvalidVersion(version.to_owned()));
        }
        let not_found = || ArtifactError::NotFound {
            name: name.to_owned(),
            version: version.to_owned(),
        };
        let latest = version == LATEST;

        let versioned_dir = self.root.join(version);
        let in_version_dir = !latest
            && tokio::fs::metadata(&versioned_dir)
                .await
                .is_ok_and(|metadata| metadata.is_dir());
        let dir = if in_version_dir {
            versioned_dir
        } else {
            self.root.clone()
        };
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(not_found());
        }

        let mut candidates = Vec::new();
        for path in self.find(&dir, name).await? {
            let artifact = Self::read(&path).await?;
            if artifact.contract_name != name {
                continue;
            }
            if latest || in_version_dir || artifact.version.as_deref() == Some(version) {
                let version = match in_version_dir {
                    true => Some(version.to_owned()),
                    false => artifact
                        .version
                        .clone()
                        .or_else(|| self.version_dir(&path)),
                };
                candidates.push(Candidate {
                    path,
                    version,
                    artifact,
                });
            }
        }

        let Candidate {
            version: resolved,
            artifact,
            ..
        } = select(candidates, latest).map_err(|paths| match paths.is_empty() {
            true => not_found(),
            false => ArtifactError::Ambiguous {
                name: name.to_owned(),
                version: version.to_owned(),
                paths,
            },
        })?;

        if !artifact.link_references.is_empty() {
            return Err(ArtifactError::UnlinkedLibraries(name.to_owned()));
        }
        let bytecode: Bytes = artifact
            .bytecode
            .parse()
            .map_err(|_| ArtifactError::NotDeployable(name.to_owned()))?;
        if bytecode.is_empty() {
            return Err(ArtifactError::NotDeployable(name.to_owned()));
        }

        tracing::debug!(name, version, ?resolved, "loaded artifact");
        Ok(Artifact {
            name: artifact.contract_name,
            version: resolved,
            abi: artifact.abi,
            bytecode,
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        alloy::{
            primitives::{Address, U256, address},
            sol_types::SolValue,
        },
        serde_json::json,
    };

    const CODE: &str = "0x6080604052348015600e575f5ffd5b50";

    fn write(path: &Path, contents: serde_json::Value) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec_pretty(&contents).unwrap()).unwrap();
    }

    fn hardhat(name: &str, constructor: serde_json::Value) -> serde_json::Value {
        json!({
            "_format": "hh-sol-artifact-1",
            "contractName": name,
            "sourceName": format!("contracts/{name}.sol"),
            "abi": [{
                "type": "constructor",
                "stateMutability": "nonpayable",
                "inputs": constructor,
            }],
            "bytecode": CODE,
            "deployedBytecode": "0x",
            "linkReferences": {},
            "deployedLinkReferences": {},
        })
    }

    fn diploma() -> serde_json::Value {
        hardhat(
            "DiplomaNFT",
            json!([
                {"name": "name", "type": "string", "internalType": "string"},
                {"name": "symbol", "type": "string", "internalType": "string"},
            ]),
        )
    }

    #[tokio::test]
    async fn loads_latest_and_encodes_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("contracts/DiplomaNFT.sol/DiplomaNFT.json"),
            diploma(),
        );
        write(
            &root.join("contracts/DiplomaNFT.sol/DiplomaNFT.dbg.json"),
            json!({"_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/x.json"}),
        );
        write(&root.join("build-info/DiplomaNFT.json"), json!({}));

        let artifact = HardhatArtifacts::new(root)
            .load("DiplomaNFT", LATEST)
            .await
            .unwrap();
        assert_eq!(artifact.name, "DiplomaNFT");
        assert_eq!(artifact.version, None);

        let code = artifact
            .deploy_code(&["DiplomaNFT".to_owned(), "DPL".to_owned()])
            .unwrap();
        let mut expected = CODE.parse::<Bytes>().unwrap().to_vec();
        expected.extend(("DiplomaNFT".to_owned(), "DPL".to_owned()).abi_encode_params());
        assert_eq!(code.to_vec(), expected);
    }

    #[tokio::test]
    async fn resolves_versions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("1.0.0/contracts/DiplomaNFT.json"), diploma());
        let mut tagged = diploma();
        tagged["version"] = json!("2.0.0");
        write(&root.join("other/DiplomaNFT.json"), tagged);

        let source = HardhatArtifacts::new(root);
        let artifact = source.load("DiplomaNFT", "1.0.0").await.unwrap();
        assert_eq!(artifact.version.as_deref(), Some("1.0.0"));
        let artifact = source.load("DiplomaNFT", "2.0.0").await.unwrap();
        assert_eq!(artifact.version.as_deref(), Some("2.0.0"));
        assert!(matches!(
            source.load("DiplomaNFT", "3.0.0").await,
            Err(ArtifactError::NotFound { .. })
        ));

        // The unversioned build does not compete with versioned ones.
        write(
            &root.join("contracts/DiplomaNFT.sol/DiplomaNFT.json"),
            diploma(),
        );
        let artifact = source.load("DiplomaNFT", LATEST).await.unwrap();
        assert_eq!(artifact.version.as_deref(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn latest_prefers_highest_version_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("1.9.0/DiplomaNFT.json"), diploma());
        write(&root.join("1.10.0/DiplomaNFT.json"), diploma());
        write(&root.join("contracts/DiplomaNFT.json"), diploma());

        let artifact = HardhatArtifacts::new(root)
            .load("DiplomaNFT", LATEST)
            .await
            .unwrap();
        assert_eq!(artifact.version.as_deref(), Some("1.10.0"));
    }

    #[tokio::test]
    async fn unversioned_copies_are_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(&root.join("contracts/DiplomaNFT.json"), diploma());
        write(&root.join("legacy/DiplomaNFT.json"), diploma());

        assert!(matches!(
            HardhatArtifacts::new(root).load("DiplomaNFT", LATEST).await,
            Err(ArtifactError::Ambiguous { paths, .. }) if paths.len() == 2
        ));
    }

    #[tokio::test]
    async fn versions_stay_below_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("artifacts");
        write(&dir.path().join("outside/DiplomaNFT.json"), diploma());
        write(&root.join("contracts/DiplomaNFT.json"), diploma());

        let source = HardhatArtifacts::new(&root);
        for version in ["../outside", "..", "/tmp", "1.0.0/../..", "."] {
            assert!(
                matches!(
                    source.load("DiplomaNFT", version).await,
                    Err(ArtifactError::InvalidVersion(_))
                ),
                "{version}"
            );
        }
    }

    #[tokio::test]
    async fn missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = HardhatArtifacts::new(dir.path().join("does-not-exist"));
        assert!(matches!(
            source.load("DiplomaNFT", LATEST).await,
            Err(ArtifactError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn refuses_undeployable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut interface = hardhat("IToken", json!([]));
        interface["bytecode"] = json!("0x");
        write(&root.join("IToken.json"), interface);
        let mut linked = hardhat("Linked", json!([]));
        linked["bytecode"] = json!("0x73__$a1b2c3$__");
        linked["linkReferences"] = json!({"contracts/Lib.sol": {"Lib": [{"start": 1, "length": 20}]}});
        write(&root.join("Linked.json"), linked);

        let source = HardhatArtifacts::new(root);
        assert!(matches!(
            source.load("IToken", LATEST).await,
            Err(ArtifactError::NotDeployable(_))
        ));
        assert!(matches!(
            source.load("Linked", LATEST).await,
            Err(ArtifactError::UnlinkedLibraries(_))
        ));
    }

    #[test]
    fn coerces_constructor_arguments() {
        let artifact = Artifact {
            name: "Vault".to_owned(),
            version: None,
            abi: serde_json::from_value(json!([{
                "type": "constructor",
                "stateMutability": "nonpayable",
                "inputs": [
                    {"name": "owner", "type": "address"},
                    {"name": "cap", "type": "uint256"},
                ],
            }]))
            .unwrap(),
            bytecode: Bytes::from_static(&[0x60, 0x80]),
        };
        let owner = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

        let code = artifact
            .deploy_code(&[owner.to_string(), "1000".to_owned()])
            .unwrap();
        let mut expected = vec![0x60, 0x80];
        expected.extend((owner, U256::from(1000)).abi_encode_params());
        assert_eq!(code.to_vec(), expected);

        assert!(matches!(
            artifact.deploy_code(&[owner.to_string()]),
            Err(ArtifactError::ArgumentCount {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            artifact.deploy_code(&["nope".to_owned(), "1000".to_owned()]),
            Err(ArtifactError::Argument { name, .. }) if name == "owner"
        ));
        assert!(matches!(
            artifact.deploy_code(&[Address::ZERO.to_string(), "lots".to_owned()]),
            Err(ArtifactError::Argument { name, .. }) if name == "cap"
        ));
    }

    #[test]
    fn no_constructor_no_arguments() {
        let artifact = Artifact {
            name: "Empty".to_owned(),
            version: None,
            abi: JsonAbi::default(),
            bytecode: Bytes::from_static(&[0x60, 0x80]),
        };
        assert_eq!(
            artifact.deploy_code(&[]).unwrap(),
            Bytes::from_static(&[0x60, 0x80])
        );
        assert!(artifact.deploy_code(&["1".to_owned()]).is_err());
    }
}
