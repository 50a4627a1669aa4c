// src/cli/plugins/deploy.rs

use anyhow::Result;
use colored::*;
use std::{collections::BTreeMap, rc::Rc};

use super::{Plugin, PluginContext};
use crate::{
    cli::{FatalError, codes, sequence_failure},
    constants::DEFAULT_ENV_NAME,
    core::{
        arg_parser::ParsedParams,
        config_loader::ConfigStore,
        environment::EnvironmentStore,
        output_extractor,
        sequencer::{self, SequenceResult, StepHost},
    },
    models::{ExtractedDeployInfo, StepOptions},
    system::executor::{self, ExecutionError, ProcessRunner},
};

/// Runtime parameters that may override the configured stage.
const STAGE_PARAMS: &[&str] = &["profile", "stage"];

/// What a deploy command name is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DeployCapability {
    Backend,
    Frontend,
    /// `all` and its synonym `project`.
    All,
    /// A target from the `deploy` section of the config.
    Target(Vec<String>),
}

const BUILTIN_COMMANDS: &[(&str, DeployCapability)] = &[
    ("backend", DeployCapability::Backend),
    ("frontend", DeployCapability::Frontend),
    ("all", DeployCapability::All),
    ("project", DeployCapability::All),
];

/// `omg deploy <target> [stage]`: deploys the backend through `serverless`, the
/// frontend to S3, or any configured sequence of both.
#[derive(Debug)]
pub struct DeployPlugin {
    config: ConfigStore,
    params: ParsedParams,
    environment: EnvironmentStore,
    runner: Rc<dyn ProcessRunner>,
    capabilities: BTreeMap<String, DeployCapability>,
    deploy_info: ExtractedDeployInfo,
}

impl DeployPlugin {
    /// Builds the plugin and its capability table. Deploying only makes sense
    /// inside a project, so a missing project root is fatal here, before any
    /// command can run.
    pub fn new(ctx: PluginContext) -> Result<Self> {
        if ctx.config.project_root().is_none() {
            return Err(FatalError::new(
                codes::DEPLOY_NO_PROJECT_ROOT,
                "Can NOT locate the project root path. Please make sure you are within a project folder.",
            )
            .into());
        }

        let params = ParsedParams::parse(&ctx.raw_args, &[]);
        let environment = EnvironmentStore::load(&ctx.config);
        let capabilities = build_capabilities(&ctx.config);

        Ok(Self {
            config: ctx.config,
            params,
            environment,
            runner: ctx.runner,
            capabilities,
            deploy_info: ExtractedDeployInfo::default(),
        })
    }

    /// Deploy info scraped by the last successful backend deployment.
    pub fn deploy_info(&self) -> &ExtractedDeployInfo {
        &self.deploy_info
    }

    pub fn environment(&self) -> &EnvironmentStore {
        &self.environment
    }

    fn run_capability(&mut self, command: &str, depth: u32) -> Result<SequenceResult> {
        let capability = self.capabilities.get(command).cloned().ok_or_else(|| {
            FatalError::new(
                codes::INVALID_COMMAND,
                format!("Method/command not part of the plugin (plugin name: deploy): {}", command),
            )
        })?;
        log::debug!("Running deploy capability '{}' ({:?}) at depth {}", command, capability, depth);

        match capability {
            DeployCapability::Backend => self.backend(depth),
            DeployCapability::Frontend => self.frontend(depth),
            DeployCapability::All => self.all(depth),
            DeployCapability::Target(steps) => {
                let options = self.project_options();
                self.deploy_target(&steps, &options, depth, codes::DEPLOY_FAILED)
            }
        }
    }

    /// Runs a sequence of steps and turns a failure into a fatal error with `code`.
    fn deploy_target(
        &mut self,
        steps: &[String],
        options: &StepOptions,
        depth: u32,
        code: i32,
    ) -> Result<SequenceResult> {
        let result = sequencer::run_sequence(steps, self, options, depth);
        if result.success {
            Ok(result)
        } else {
            let message = match code {
                codes::DEPLOY_BACKEND_FAILED => "BACKEND: Deployment failed!",
                codes::DEPLOY_FRONTEND_FAILED => "FRONTEND: Deployment failed!",
                _ => "Deployment sequence failed, deployment NOT completed",
            };
            Err(sequence_failure(result, code, message))
        }
    }

    fn backend(&mut self, depth: u32) -> Result<SequenceResult> {
        println!("\n{}\n", "BACKEND: Deployment started".bold());

        let stage = self.stage_for("stageBackend");
        let env_name = if stage.is_empty() {
            DEFAULT_ENV_NAME.to_string()
        } else {
            stage.clone()
        };
        let command = if stage.is_empty() {
            "serverless deploy -v".to_string()
        } else {
            format!("serverless deploy -v --stage={}", executor::quote(&stage))
        };

        let options = self.tier_options(self.config.backend_path());
        let result = self.deploy_target(&[command], &options, depth, codes::DEPLOY_BACKEND_FAILED)?;

        let info = output_extractor::extract_deploy_info(result.first_output());
        log::debug!("Extracted deploy info: {:?}", info);
        println!("\n{}\n", "BACKEND: Deployment completed successfully!".green().bold());

        self.environment.record_deploy(&env_name, &info);
        if let Err(e) = self.environment.save() {
            log::error!("Can NOT save the environment configuration file ({})", e);
        }
        self.deploy_info = info;

        Ok(result)
    }

    fn frontend(&mut self, depth: u32) -> Result<SequenceResult> {
        println!("\n{}\n", "FRONTEND: Deployment started".bold());

        let stage = self.stage_for("stageFrontend");
        let bucket = match self.config.get_str("s3BucketName") {
            "" if !stage.is_empty() && !self.config.get_str("s3Bucket").is_empty() => {
                format!("{}{}", self.config.get_str("s3Bucket"), stage)
            }
            exact => exact.to_string(),
        };

        // Checked before anything runs: a half-synced bucket is hard to undo.
        if stage.is_empty() {
            println!("\nPlease set up a valid stage in the Omega configuration file");
            return Err(FatalError::new(codes::DEPLOY_FRONTEND_FAILED, "FRONTEND: Deployment failed!").into());
        }
        if bucket.is_empty() {
            println!("\nPlease set up a valid S3 bucket in the Omega configuration file");
            return Err(FatalError::new(codes::DEPLOY_FRONTEND_FAILED, "FRONTEND: Deployment failed!").into());
        }

        let profile = executor::quote(&stage);
        let steps = vec![
            format!("au build --env={}", profile),
            format!(
                "aws --profile {} s3 sync scripts {}",
                profile,
                executor::quote(&format!("s3://{}/scripts/", bucket))
            ),
            format!(
                "aws --profile {} s3 cp index.html {}",
                profile,
                executor::quote(&format!("s3://{}", bucket))
            ),
        ];

        let options = self.tier_options(self.config.frontend_path());
        let result = self.deploy_target(&steps, &options, depth, codes::DEPLOY_FRONTEND_FAILED)?;

        println!("\n\nYour application has been deployed to:");
        println!("http://{}.s3-website-us-east-1.amazonaws.com/\n", bucket);
        println!("\n{}\n", "FRONTEND: Deployment completed successfully!".green().bold());
        Ok(result)
    }

    fn all(&mut self, depth: u32) -> Result<SequenceResult> {
        let steps = vec!["backend".to_string(), "frontend".to_string()];
        let options = self.project_options();
        self.deploy_target(&steps, &options, depth, codes::DEPLOY_FAILED)
    }

    /// Stage precedence: third positional, then the tier-specific key, then
    /// `stage`, then `profile`.
    fn stage_for(&self, tier_key: &str) -> String {
        self.params
            .positional(2)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                [tier_key, "stage", "profile"]
                    .into_iter()
                    .map(|key| self.config.get_str(key))
                    .find(|value| !value.is_empty())
            })
            .unwrap_or_default()
            .to_string()
    }

    fn tier_options(&self, tier_path: Option<std::path::PathBuf>) -> StepOptions {
        match tier_path {
            Some(path) => StepOptions::in_dir(path),
            None => StepOptions::default(),
        }
    }

    fn project_options(&self) -> StepOptions {
        self.tier_options(self.config.project_root().map(|p| p.to_path_buf()))
    }
}

/// Built-in commands first, then every configured target whose name does not
/// shadow a built-in.
fn build_capabilities(config: &ConfigStore) -> BTreeMap<String, DeployCapability> {
    let mut capabilities: BTreeMap<String, DeployCapability> = BUILTIN_COMMANDS
        .iter()
        .map(|(name, capability)| (name.to_string(), capability.clone()))
        .collect();

    for (name, target) in config.deploy_targets() {
        if capabilities.contains_key(&name) {
            log::warn!(
                "Deploy target '{}' has the same name as a built-in command and is ignored.",
                name
            );
            continue;
        }
        capabilities.insert(name, DeployCapability::Target(target.steps()));
    }
    capabilities
}

impl StepHost for DeployPlugin {
    fn is_step_command(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    fn run_step_command(&mut self, name: &str, depth: u32) -> Result<SequenceResult> {
        self.run_capability(name, depth)
    }

    fn run_external(
        &mut self,
        command_line: &str,
        options: &StepOptions,
    ) -> Result<String, ExecutionError> {
        self.runner.run(command_line, options)
    }
}

impl Plugin for DeployPlugin {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.keys().cloned().collect()
    }

    fn is_capability(&self, command: &str) -> bool {
        self.capabilities.contains_key(command)
    }

    fn invoke(&mut self, command: &str, params: &ParsedParams) -> Result<SequenceResult> {
        self.config.process_params(params, Some(STAGE_PARAMS));
        self.run_capability(command, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::{CONFIG_FILENAME, ENV_FILENAME, OMEGA_DIR},
        system::executor::test_support::RecordingRunner,
    };
    use serde_json::json;
    use std::{fs, path::Path};
    use tempfile::TempDir;

    const SLS_OUTPUT: &str = "Service Information\napi keys:\n  None\nendpoints:\n  GET - https://x.execute-api.us-east-1.amazonaws.com/prod/items\nfunctions:\n  items: shop-prod-items\nStack Outputs\nServiceEndpoint: https://x.execute-api.us-east-1.amazonaws.com/prod\n";

    fn project(config: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(OMEGA_DIR)).unwrap();
        fs::create_dir_all(tmp.path().join("backend")).unwrap();
        fs::create_dir_all(tmp.path().join("frontend")).unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), config).unwrap();
        tmp
    }

    fn plugin(root: &Path, args: &[&str], runner: &RecordingRunner) -> DeployPlugin {
        let config = ConfigStore::from_locations(
            root.to_path_buf(),
            Some(root.to_path_buf()),
            root.join("install"),
        );
        DeployPlugin::new(PluginContext {
            raw_args: args.iter().map(|s| s.to_string()).collect(),
            config,
            runner: Rc::new(runner.clone()),
            interactive: false,
        })
        .unwrap()
    }

    fn params(args: &[&str]) -> ParsedParams {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        ParsedParams::parse(&args, &[])
    }

    fn fatal_code(err: anyhow::Error) -> i32 {
        err.downcast_ref::<FatalError>().expect("expected a FatalError").code
    }

    #[test]
    fn test_requires_project_root() {
        let tmp = TempDir::new().unwrap();
        let config = ConfigStore::from_locations(tmp.path().to_path_buf(), None, tmp.path().join("i"));
        let err = DeployPlugin::new(PluginContext {
            raw_args: vec!["deploy".to_string()],
            config,
            runner: Rc::new(RecordingRunner::new()),
            interactive: false,
        })
        .unwrap_err();
        assert_eq!(fatal_code(err), codes::DEPLOY_NO_PROJECT_ROOT);
    }

    #[test]
    fn test_capability_table_includes_configured_targets() {
        let tmp = project(r#"{ "deploy": { "everything": ["back", "front"], "backend": "echo shadow" } }"#);
        let deploy = plugin(tmp.path(), &["deploy"], &RecordingRunner::new());

        assert_eq!(
            deploy.capabilities(),
            vec!["all", "back", "backend", "everything", "front", "frontend", "project"]
        );
        assert!(deploy.is_capability("everything"));
        assert!(!deploy.is_capability("sideways"));
        // The built-in is not shadowed.
        assert_eq!(deploy.capabilities.get("backend"), Some(&DeployCapability::Backend));
    }

    #[test]
    fn test_backend_deploy_records_environment() {
        let tmp = project(r#"{ "stage": "prod" }"#);
        let runner = RecordingRunner::new().with_output("serverless deploy", SLS_OUTPUT);
        let mut deploy = plugin(tmp.path(), &["deploy", "backend"], &runner);

        let result = deploy.invoke("backend", &params(&["deploy", "backend"])).unwrap();

        assert!(result.success);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "serverless deploy -v --stage=prod");
        assert_eq!(calls[0].1.cwd, Some(tmp.path().join("backend/")));

        assert_eq!(
            deploy.deploy_info().base_url,
            "https://x.execute-api.us-east-1.amazonaws.com/prod"
        );
        let record = deploy.environment().get("prod").unwrap();
        assert_eq!(record.get("apiKey"), Some(&json!("")));

        let written = fs::read_to_string(tmp.path().join(ENV_FILENAME)).unwrap();
        assert!(written.starts_with("module.exports = "));
        assert!(written.contains("https://x.execute-api.us-east-1.amazonaws.com/prod"));
    }

    #[test]
    fn test_stage_from_positional_and_params() {
        let tmp = project(r#"{ "stage": "dev", "stageBackend": "qa" }"#);
        let runner = RecordingRunner::new();

        let mut deploy = plugin(tmp.path(), &["deploy", "backend", "prod"], &runner);
        deploy.invoke("backend", &params(&["deploy", "backend", "prod"])).unwrap();

        let mut deploy = plugin(tmp.path(), &["deploy", "backend"], &runner);
        deploy.invoke("backend", &params(&["deploy", "backend"])).unwrap();

        let tmp2 = project(r#"{ "stage": "dev" }"#);
        let mut deploy = plugin(tmp2.path(), &["deploy", "backend", "--stage=staging"], &runner);
        deploy
            .invoke("backend", &params(&["deploy", "backend", "--stage=staging"]))
            .unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "serverless deploy -v --stage=prod",
                "serverless deploy -v --stage=qa",
                "serverless deploy -v --stage=staging",
            ]
        );
    }

    #[test]
    fn test_backend_without_stage_uses_default_env() {
        let tmp = project("{}");
        let runner = RecordingRunner::new().with_output("serverless", SLS_OUTPUT);
        let mut deploy = plugin(tmp.path(), &["deploy", "backend"], &runner);

        deploy.invoke("backend", &params(&["deploy", "backend"])).unwrap();

        assert_eq!(runner.commands(), vec!["serverless deploy -v"]);
        assert!(deploy.environment().get(DEFAULT_ENV_NAME).is_some());
    }

    #[test]
    fn test_backend_failure_is_fatal_302() {
        let tmp = project(r#"{ "stage": "dev" }"#);
        let runner = RecordingRunner::new().failing_on("serverless");
        let mut deploy = plugin(tmp.path(), &["deploy", "backend"], &runner);

        let err = deploy.invoke("backend", &params(&["deploy", "backend"])).unwrap_err();
        assert_eq!(fatal_code(err), codes::DEPLOY_BACKEND_FAILED);
        assert!(!tmp.path().join(ENV_FILENAME).exists());
    }

    #[test]
    fn test_frontend_runs_build_and_sync() {
        let tmp = project(r#"{ "stage": "dev", "s3Bucket": "shop-" }"#);
        let runner = RecordingRunner::new();
        let mut deploy = plugin(tmp.path(), &["deploy", "frontend"], &runner);

        deploy.invoke("frontend", &params(&["deploy", "frontend"])).unwrap();

        let words: Vec<Vec<String>> = runner
            .commands()
            .iter()
            .map(|c| shlex::split(c).unwrap())
            .collect();
        assert_eq!(
            words,
            vec![
                vec!["au", "build", "--env=dev"],
                vec!["aws", "--profile", "dev", "s3", "sync", "scripts", "s3://shop-dev/scripts/"],
                vec!["aws", "--profile", "dev", "s3", "cp", "index.html", "s3://shop-dev"],
            ]
        );
        assert!(runner
            .calls()
            .iter()
            .all(|(_, opts)| opts.cwd == Some(tmp.path().join("frontend/"))));
    }

    #[test]
    fn test_frontend_exact_bucket_name_wins() {
        let tmp = project(r#"{ "profile": "ops", "s3Bucket": "shop-", "s3BucketName": "www.shop.com" }"#);
        let runner = RecordingRunner::new();
        let mut deploy = plugin(tmp.path(), &["deploy", "front"], &runner);

        deploy.invoke("front", &params(&["deploy", "front"])).unwrap();

        let last = runner.commands().pop().unwrap();
        assert_eq!(
            shlex::split(&last).unwrap(),
            vec!["aws", "--profile", "ops", "s3", "cp", "index.html", "s3://www.shop.com"]
        );
    }

    #[test]
    fn test_frontend_preconditions_fail_before_any_process() {
        let tmp = project(r#"{ "s3Bucket": "shop-" }"#);
        let runner = RecordingRunner::new();
        let mut deploy = plugin(tmp.path(), &["deploy", "frontend"], &runner);
        let err = deploy.invoke("frontend", &params(&["deploy", "frontend"])).unwrap_err();
        assert_eq!(fatal_code(err), codes::DEPLOY_FRONTEND_FAILED);

        let tmp = project(r#"{ "stage": "dev" }"#);
        let mut deploy = plugin(tmp.path(), &["deploy", "frontend"], &runner);
        let err = deploy.invoke("frontend", &params(&["deploy", "frontend"])).unwrap_err();
        assert_eq!(fatal_code(err), codes::DEPLOY_FRONTEND_FAILED);

        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_all_stops_after_backend_failure() {
        let tmp = project(r#"{ "stage": "dev", "s3Bucket": "shop-" }"#);
        let runner = RecordingRunner::new().failing_on("serverless");
        let mut deploy = plugin(tmp.path(), &["deploy", "all"], &runner);

        let err = deploy.invoke("all", &params(&["deploy", "all"])).unwrap_err();

        // The backend's own code survives the outer sequence.
        assert_eq!(fatal_code(err), codes::DEPLOY_BACKEND_FAILED);
        assert_eq!(runner.commands(), vec!["serverless deploy -v --stage=dev"]);
    }

    #[test]
    fn test_configured_target_mixes_commands_and_shell_steps() {
        let tmp = project(r#"{ "stage": "dev", "deploy": { "release": ["back", "./notify.sh"] } }"#);
        let runner = RecordingRunner::new().with_output("serverless", SLS_OUTPUT);
        let mut deploy = plugin(tmp.path(), &["deploy", "release"], &runner);

        let result = deploy.invoke("release", &params(&["deploy", "release"])).unwrap();

        assert!(result.success);
        assert_eq!(result.output.len(), 2);
        assert_eq!(runner.commands(), vec!["serverless deploy -v --stage=dev", "./notify.sh"]);
        assert_eq!(runner.calls()[1].1.cwd, Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn test_failing_shell_step_in_target_is_fatal_300() {
        let tmp = project(r#"{ "deploy": { "smoke": ["./check.sh", "./never.sh"] } }"#);
        let runner = RecordingRunner::new().failing_on("check");
        let mut deploy = plugin(tmp.path(), &["deploy", "smoke"], &runner);

        let err = deploy.invoke("smoke", &params(&["deploy", "smoke"])).unwrap_err();
        assert_eq!(fatal_code(err), codes::DEPLOY_FAILED);
        assert_eq!(runner.commands(), vec!["./check.sh"]);
    }

    #[test]
    fn test_cyclic_targets_are_bounded() {
        let tmp = project(r#"{ "deploy": { "ping": "pong", "pong": "ping" } }"#);
        let runner = RecordingRunner::new();
        let mut deploy = plugin(tmp.path(), &["deploy", "ping"], &runner);

        let err = deploy.invoke("ping", &params(&["deploy", "ping"])).unwrap_err();
        assert_eq!(fatal_code(err), codes::DEPLOY_FAILED);
        assert!(runner.commands().is_empty());
    }
}
