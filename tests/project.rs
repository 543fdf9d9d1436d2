mod common;

use camino::Utf8Path;
use common::{project_with_models, utf8, write};
use qgenlink::Project;
use qgenlink::project::{ConfigError, PROJECT_FILE, is_diagram_json, is_model_file, load_config_from_str};
use qgenlink::toolchain::{ExecutableResolver, Toolchain, normalize};
use tempfile::tempdir;

const PROJECT_TOML: &str = r#"
[project]
source_dirs = ["models", "src"]
object_dir = "build/obj"
main = ["main.adb"]
build = ["gprbuild", "-P", "ctrl.gpr"]
debugger = "gdb-multiarch"

[qgen]
output_dir = "build/generated"
generator = "/opt/qgen/bin/qgenc"

[qgen.switches]
simulink = "-l c --full-flattening"
"nav.mdl" = "-m 'nav init.m'"
"#;

#[test]
fn load_from_project_file() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    write(&root.join(PROJECT_FILE), PROJECT_TOML);
    write(&root.join("models/ctrl.mdl"), "Model { }\n");
    write(&root.join("models/nav.mdl"), "Model { }\n");
    write(&root.join("src/main.adb"), "procedure Main is begin null; end;\n");

    let project = Project::load(root.join(PROJECT_FILE)).unwrap();
    let root = project.root().to_path_buf();
    let models: Vec<_> = project.model_files().cloned().collect();
    assert_eq!(models, vec![root.join("models/ctrl.mdl"), root.join("models/nav.mdl")]);
    assert_eq!(project.sources().len(), 3);

    let ctrl = root.join("models/ctrl.mdl");
    let nav = root.join("models/nav.mdl");
    assert_eq!(project.switches(&ctrl), vec!["-l", "c", "--full-flattening"]);
    assert_eq!(project.switches(&nav), vec!["-m", "nav init.m"]);
    assert_eq!(project.output_dir(&ctrl), root.join("build/generated"));
    assert_eq!(project.mapping_artifact(&nav), root.join("build/generated/nav.mdl.json"));
    assert_eq!(
        project.build_command("main.adb").to_string(),
        "gprbuild -P ctrl.gpr main.adb"
    );

    let toolchain = Toolchain::discover(&project);
    assert_eq!(toolchain.generator().unwrap().as_str(), "/opt/qgen/bin/qgenc");
}

#[test]
fn output_dir_defaults_to_object_dir() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    let project = Project::from_config(root.clone(), load_config_from_str("").unwrap());
    let model = root.join("ctrl.mdl");
    assert_eq!(project.output_dir(&model), root.join("obj"));
    assert_eq!(project.mapping_artifact(&model), root.join("obj/ctrl.mdl.json"));
    assert!(project.switches(&model).is_empty());
    if cfg!(unix) {
        assert_eq!(project.executable_path("src/main.adb"), root.join("obj/main"));
    }
}

#[test]
fn empty_per_file_switches_fall_back_to_default() {
    let config = load_config_from_str(
        r#"
[qgen.switches]
simulink = "-l c"
"ctrl.mdl" = "  "
"#,
    )
    .unwrap();
    let project = Project::from_config("/p", config);
    assert_eq!(project.switches(Utf8Path::new("/p/ctrl.mdl")), vec!["-l", "c"]);
}

#[test]
fn invalid_project_files_are_rejected() {
    assert!(matches!(
        load_config_from_str("[project]\nobject_dir = \"\"\n"),
        Err(ConfigError::ValidationError(_))
    ));
    assert!(matches!(
        load_config_from_str("[qgen.switches]\nsimulink = \"-m 'open\"\n"),
        Err(ConfigError::ValidationError(_))
    ));
    assert!(matches!(
        load_config_from_str("[project\n"),
        Err(ConfigError::ParseError(_))
    ));

    let tmp = tempdir().unwrap();
    let err = Project::load(utf8(tmp.path()).join(PROJECT_FILE)).unwrap_err();
    assert!(err.to_string().contains("Failed to load project"));
}

#[test]
fn recompute_picks_up_new_sources() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    let mut project = project_with_models(&root, &["ctrl.mdl"]);
    assert_eq!(project.model_files().count(), 1);

    write(&root.join("src/sub/nav.mdl"), "Model { }\n");
    write(&root.join("src/ctrl.adb"), "package body Ctrl is end;\n");
    assert_eq!(project.model_files().count(), 1);

    project.recompute();
    assert_eq!(project.generation(), 1);
    assert_eq!(project.model_files().count(), 2);
    assert_eq!(project.sources().len(), 3);
}

#[test]
fn file_classification() {
    assert!(is_model_file(Utf8Path::new("a/ctrl.mdl")));
    assert!(is_model_file(Utf8Path::new("CTRL.MDL")));
    assert!(!is_model_file(Utf8Path::new("ctrl.mdl.json")));
    assert!(is_diagram_json(Utf8Path::new("a/ctrl.mdl.json")));
    assert!(!is_diagram_json(Utf8Path::new("a/ctrl.json")));
}

#[test]
fn resolver_first_match_wins() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    write(&root.join("b/qgenc"), "");
    write(&root.join("c/qgenc"), "");
    let resolver = ExecutableResolver::new([root.join("a"), root.join("b"), root.join("c")]);
    assert_eq!(resolver.locate("qgenc"), Some(root.join("b/qgenc")));
    assert_eq!(resolver.locate("mdl2json"), None);
}

#[test]
fn normalize_is_lexical() {
    assert_eq!(
        normalize(Utf8Path::new("/opt/qgen/bin/../libexec/./qgen/bin/mdl2json")),
        Utf8Path::new("/opt/qgen/libexec/qgen/bin/mdl2json")
    );
    assert_eq!(normalize(Utf8Path::new("bin/../../x")), Utf8Path::new("../x"));
    assert_eq!(normalize(Utf8Path::new("/..")), Utf8Path::new("/"));
    assert_eq!(
        Toolchain::converter_for(Utf8Path::new("qgenc")).as_str(),
        "../libexec/qgen/bin/mdl2json"
    );
}

#[test]
fn configured_generator_is_resolved() {
    let tmp = tempdir().unwrap();
    let root = utf8(tmp.path());
    let with_generator = |generator: &str| {
        let text = format!("[qgen]\ngenerator = \"{generator}\"\n");
        Project::from_config(root.clone(), load_config_from_str(&text).unwrap())
    };

    // Relative to the project root, not to the working directory.
    let project = with_generator("tools/qgen/bin/qgenc");
    let toolchain = Toolchain::discover_with(&project, &ExecutableResolver::new(Vec::<&str>::new()));
    assert_eq!(toolchain.generator(), Some(root.join("tools/qgen/bin/qgenc").as_path()));
    assert_eq!(
        toolchain.converter(),
        Some(root.join("tools/qgen/libexec/qgen/bin/mdl2json").as_path())
    );

    // A bare name goes through the search path.
    write(&root.join("opt/qgen/bin/qgenc-24"), "");
    let resolver = ExecutableResolver::new([root.join("opt/qgen/bin")]);
    let toolchain = Toolchain::discover_with(&with_generator("qgenc-24"), &resolver);
    assert_eq!(toolchain.generator(), Some(root.join("opt/qgen/bin/qgenc-24").as_path()));
    assert_eq!(
        toolchain.converter(),
        Some(root.join("opt/qgen/libexec/qgen/bin/mdl2json").as_path())
    );

    let toolchain = Toolchain::discover_with(&with_generator("qgenc-missing"), &resolver);
    assert!(!toolchain.is_available());
}
