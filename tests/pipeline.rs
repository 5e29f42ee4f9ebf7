use std::cell::RefCell;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use reality_installer::collector::{AcceptDefaults, Answers, StdioPrompter};
use reality_installer::utils::command::{CommandOutput, CommandRunner};
use reality_installer::utils::generate_x25519_keypair;
use reality_installer::{Config, InstallError, Installer, Options, Settings};

/// 模拟宿主机: x25519 输出固定密钥, is-active 返回预设状态
struct FakeHost {
    x25519_output: String,
    active: bool,
    calls: RefCell<Vec<String>>,
}

impl FakeHost {
    fn new(x25519_output: String, active: bool) -> Self {
        Self {
            x25519_output,
            active,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn called(&self, prefix: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.starts_with(prefix))
    }
}

impl CommandRunner for FakeHost {
    async fn run(&self, program: &str, args: &[&str]) -> std::io::Result<CommandOutput> {
        let line = format!("{} {}", program, args.join(" "));
        self.calls.borrow_mut().push(line.clone());

        let (success, stdout) = if line.ends_with(" x25519") {
            (true, self.x25519_output.clone())
        } else if line.starts_with("systemctl is-active") {
            (self.active, if self.active { "active" } else { "failed" }.to_string())
        } else if line.starts_with("journalctl") {
            (true, "xray[1]: failed to read config".to_string())
        } else {
            (true, String::new())
        };

        Ok(CommandOutput {
            success,
            code: Some(if success { 0 } else { 3 }),
            stdout,
            stderr: String::new(),
        })
    }

    fn exists(&self, program: &str) -> bool {
        program == "ufw"
    }
}

struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let root = std::env::temp_dir().join(format!("reality-pipeline-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("xray"), b"#!/bin/sh\n").unwrap();
        Self { root }
    }

    fn settings(&self, providers: Vec<String>) -> Settings {
        let mut settings = Settings::default();
        settings.paths.xray_binary = self.root.join("xray");
        settings.paths.config = self.root.join("etc/config.json");
        settings.paths.unit = self.root.join("systemd/xray.service");
        settings.paths.sysctl = self.root.join("sysctl.d/99-xray.conf");
        settings.paths.summary = self.root.join("etc/client-info.txt");
        settings.service.settle_secs = 0;
        settings.report.ip_providers = providers;
        settings.report.lookup_timeout_secs = 2;
        settings
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn options(answers: Answers) -> Options {
    Options {
        check_privilege: false,
        skip_deps: true,
        answers,
        ..Options::default()
    }
}

/// 本地 HTTP 服务, 对每个请求返回固定 IP
async fn ip_server(ip: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                ip.len(),
                ip
            );
            let _ = stream.write_all(response.as_bytes()).await;
        }
    });

    format!("http://{}/", addr)
}

fn exists(path: &Path) -> bool {
    path.is_file()
}

#[tokio::test]
async fn test_full_install() {
    let sandbox = Sandbox::new();
    let keys = generate_x25519_keypair();
    let host = FakeHost::new(
        format!("Private key: {}\nPublic key: {}\n", keys.private_key, keys.public_key),
        true,
    );

    // 第一个地址不可达, 回落到第二个
    let providers = vec!["http://127.0.0.1:1/".to_string(), ip_server("203.0.113.7").await];
    let installer = Installer::new(sandbox.settings(providers), options(Answers::default()));

    let mut prompter = StdioPrompter::new(Cursor::new("\n8443\n\n3\n"), Vec::new());
    let report = installer.run(&host, &mut prompter).await.unwrap();

    assert_eq!(report.host, "203.0.113.7");
    assert_eq!(report.profile.listen_port, 8443);
    assert_eq!(report.profile.key_pair, keys);

    let config = Config::load(sandbox.path("etc/config.json")).unwrap();
    assert_eq!(config.inbounds[0].port, 8443);
    assert_eq!(config.inbounds[0].settings.clients[0].id, report.profile.client_id);
    assert_eq!(config.inbounds[0].settings.clients[0].flow, "");

    let expected = format!(
        "vless://{}@203.0.113.7:8443?security=reality&sni=www.microsoft.com&flow=&pbk={}&sid={}&type=tcp&headerType=none#Reality-203.0.113.7",
        report.profile.client_id,
        keys.public_key,
        report.profile.short_ids[0],
    );
    assert_eq!(report.share_uri, expected);

    let summary = fs::read_to_string(sandbox.path("etc/client-info.txt")).unwrap();
    assert!(summary.contains(&expected));
    assert!(!summary.contains(&keys.private_key));

    let unit = fs::read_to_string(sandbox.path("systemd/xray.service")).unwrap();
    assert!(unit.contains(&format!("run -config {}", sandbox.path("etc/config.json").display())));
    assert!(exists(&sandbox.path("sysctl.d/99-xray.conf")));

    assert!(host.called("ufw allow 8443/tcp"));
    assert!(host.called("systemctl restart xray.service"));
}

#[tokio::test]
async fn test_inactive_service_is_fatal() {
    let sandbox = Sandbox::new();
    let keys = generate_x25519_keypair();
    let host = FakeHost::new(
        format!("PrivateKey: {}\nPassword: {}\n", keys.private_key, keys.public_key),
        false,
    );
    let installer = Installer::new(sandbox.settings(Vec::new()), options(Answers::default()));

    let result = installer.run(&host, &mut AcceptDefaults).await;
    match result {
        Err(InstallError::ServiceStart { journal, .. }) => {
            assert!(journal.contains("failed to read config"));
        }
        other => panic!("expected ServiceStart, got {:?}", other.map(|r| r.share_uri)),
    }

    // 配置已写入, 但不应生成成功摘要
    assert!(exists(&sandbox.path("etc/config.json")));
    assert!(!exists(&sandbox.path("etc/client-info.txt")));
}

#[tokio::test]
async fn test_unparseable_keys_stop_before_config() {
    let sandbox = Sandbox::new();
    let host = FakeHost::new("xray: unknown command \"x25519\"\n".to_string(), true);
    let installer = Installer::new(sandbox.settings(Vec::new()), options(Answers::default()));

    let result = installer.run(&host, &mut AcceptDefaults).await;
    assert!(matches!(result, Err(InstallError::KeyGeneration(_))));
    assert!(!exists(&sandbox.path("etc/config.json")));
    assert!(!host.called("systemctl"));
}

#[tokio::test]
async fn test_invalid_defaults_stop_before_any_change() {
    let sandbox = Sandbox::new();
    let keys = generate_x25519_keypair();
    let host = FakeHost::new(
        format!("Private key: {}\nPublic key: {}\n", keys.private_key, keys.public_key),
        true,
    );
    let mut settings = sandbox.settings(Vec::new());
    settings.defaults.port = 0;
    settings.defaults.sni = "not a domain".to_string();
    let installer = Installer::new(settings, options(Answers::default()));

    let result = installer.run(&host, &mut AcceptDefaults).await;
    assert!(matches!(result, Err(InstallError::Settings(_))));
    assert!(!host.called("/"));
    assert!(!exists(&sandbox.path("sysctl.d/99-xray.conf")));
    assert!(!exists(&sandbox.path("etc/config.json")));
}

#[tokio::test]
async fn test_missing_binary_with_skip_deps() {
    let sandbox = Sandbox::new();
    fs::remove_file(sandbox.path("xray")).unwrap();
    let host = FakeHost::new(String::new(), true);
    let installer = Installer::new(sandbox.settings(Vec::new()), options(Answers::default()));

    let result = installer.run(&host, &mut AcceptDefaults).await;
    assert!(matches!(result, Err(InstallError::BinaryInstall(_))));
}

#[tokio::test]
async fn test_unknown_ip_uses_placeholder() {
    let sandbox = Sandbox::new();
    let keys = generate_x25519_keypair();
    let host = FakeHost::new(
        format!("Private key: {}\nPublic key: {}\n", keys.private_key, keys.public_key),
        true,
    );
    let answers = Answers {
        sni: Some("www.apple.com".to_string()),
        ..Answers::default()
    };
    let installer = Installer::new(sandbox.settings(Vec::new()), options(answers));

    let report = installer.run(&host, &mut AcceptDefaults).await.unwrap();
    assert_eq!(report.host, "YOUR_SERVER_IP");
    assert!(report.share_uri.contains("@YOUR_SERVER_IP:443?"));
    assert!(report.share_uri.contains("&sni=www.apple.com&flow=xtls-rprx-vision&"));
}

#[test]
fn test_blocking_collect_defaults() {
    // 同步代码路径也可以借助 tokio-test 驱动安装器
    let sandbox = Sandbox::new();
    let keys = generate_x25519_keypair();
    let host = FakeHost::new(
        format!("Private key: {}\nPublic key: {}\n", keys.private_key, keys.public_key),
        true,
    );
    let mut opts = options(Answers::default());
    opts.skip_sysctl = true;
    opts.skip_firewall = true;
    let installer = Installer::new(sandbox.settings(Vec::new()), opts);

    let report = tokio_test::block_on(installer.run(&host, &mut AcceptDefaults)).unwrap();
    assert_eq!(report.profile.listen_port, 443);
    assert!(!exists(&sandbox.path("sysctl.d/99-xray.conf")));
    assert!(!host.called("ufw"));
}
