use super::*;

fn intent(cmd: &str) -> CommandIntent {
    classify(cmd).intent
}

fn rewrite(cmd: &str) -> String {
    classify(cmd)
        .suggested_rewrite
        .unwrap_or_else(|| panic!("no rewrite for {cmd}"))
}

#[test]
fn test_read_only_commands_are_certain() {
    for cmd in [
        "df -h",
        "ps aux | grep nginx | head -5",
        "cat /var/log/syslog | tail -n 50",
        "uptime && free -m",
        "/usr/bin/ls -la /var/log 2>/dev/null",
        "systemctl status nginx",
        "systemctl list-units --state=failed",
        "docker ps -a",
        "docker exec homepage df -h",
        "docker logs --tail 50 homepage",
        "kubectl get pods -n default -o wide",
        "kubectl exec nginx-abc -- ls /",
        "ip -br addr show",
        "ip route",
        "zfs list",
        "zpool status",
        "pct list",
        "qm config 200",
        "pvesh get /nodes",
        "git log --oneline -5",
        "apt list --installed",
        "iptables -nL",
        "crontab -l",
        "date +%F",
        "find /var/log -name '*.log' -mtime +7",
        "sed -n '1,10p' /etc/hosts",
        "sed 's/foo/bar/g' /etc/hosts",
        "awk '{print $1}' /etc/hosts",
        "curl -s http://example.com/health | jq .",
        "wget -qO- http://example.com",
        "timeout 5 df -h",
        "xargs -n1 echo",
        "journalctl -u nginx -n 100 --no-pager",
        "top -b -n 1",
        "top -bn1",
        "docker stats --no-stream",
        "ping -c 3 8.8.8.8",
        "vmstat 1 5",
        "python3 --version",
        "uptime # load average",
    ] {
        assert_eq!(intent(cmd), CommandIntent::ReadOnlyCertain, "{cmd}");
    }
}

#[test]
fn test_write_verbs_and_unknown_binaries() {
    let cases = [
        ("rm -rf /tmp/x", Some(BlockCategory::WriteVerb)),
        ("systemctl restart nginx", Some(BlockCategory::WriteVerb)),
        ("docker restart web", Some(BlockCategory::WriteVerb)),
        ("docker compose up -d", Some(BlockCategory::WriteVerb)),
        ("kubectl delete pod x", Some(BlockCategory::WriteVerb)),
        ("pct stop 141", Some(BlockCategory::WriteVerb)),
        ("qm destroy 200", Some(BlockCategory::WriteVerb)),
        ("ip link set eth0 down", Some(BlockCategory::WriteVerb)),
        ("sed -i s/a/b/ /etc/hosts", Some(BlockCategory::WriteVerb)),
        ("sed -n 's/a/b/w /tmp/x' f", Some(BlockCategory::WriteVerb)),
        ("find / -name core -delete", Some(BlockCategory::WriteVerb)),
        ("find . -exec chmod 777 {} ;", Some(BlockCategory::WriteVerb)),
        ("curl -X POST http://x/api", Some(BlockCategory::WriteVerb)),
        ("curl -sSLo out.bin http://x/f", Some(BlockCategory::WriteVerb)),
        ("curl -d a=1 http://x", Some(BlockCategory::WriteVerb)),
        ("awk '{system(\"id\")}' f", Some(BlockCategory::WriteVerb)),
        ("awk '{print $1 > \"/tmp/x\"}' f", Some(BlockCategory::WriteVerb)),
        ("git push origin main", Some(BlockCategory::WriteVerb)),
        ("git branch feature", Some(BlockCategory::WriteVerb)),
        ("mysql -e 'DROP TABLE users'", Some(BlockCategory::WriteVerb)),
        ("redis-cli FLUSHALL", Some(BlockCategory::WriteVerb)),
        ("mkfs.ext4 /dev/sdb1", Some(BlockCategory::WriteVerb)),
        ("frobnicate --all", Some(BlockCategory::UnknownBinary)),
        ("sudo ls", Some(BlockCategory::Privilege)),
        ("python3", Some(BlockCategory::InteractiveRepl)),
        ("mysql -u root", Some(BlockCategory::InteractiveRepl)),
        ("bash -c 'ls'", None),
        ("FOO=1 ls", None),
        ("git -c core.pager=id log", None),
    ];
    for (cmd, category) in cases {
        let c = classify(cmd);
        assert_eq!(c.intent, CommandIntent::WriteOrUnknown, "{cmd}");
        assert_eq!(c.category, category, "{cmd}");
        assert!(!c.auto_recoverable, "{cmd}");
    }
}

#[test]
fn test_sed_commands_without_separating_space_are_refused() {
    for cmd in [
        "sed -n '1w/tmp/x' /etc/hosts",
        "sed '1etouch /tmp/pwned' /etc/hostname",
        "sed -n '$W/tmp/x' /etc/hosts",
        "sed -n '/root/w/tmp/x' /etc/passwd",
        "sed 's/a/b/gw/tmp/x' /etc/hosts",
        "sed 's/.*/id/e' /etc/hostname",
        "sed -n 'p;1w/tmp/x' /etc/hosts",
        "sed -n '1,3{w/tmp/x\n}' /etc/hosts",
        "sed '1r/etc/shadow' /etc/hostname",
        "sed -e 'p' -e '2e id' /etc/hosts",
        "sed -n 's/a/b' /etc/hosts",
    ] {
        let c = classify(cmd);
        assert_eq!(c.intent, CommandIntent::WriteOrUnknown, "{cmd}");
        assert_eq!(c.category, Some(BlockCategory::WriteVerb), "{cmd}");
    }
    for cmd in [
        "sed -n '/error/p' /var/log/syslog",
        "sed -n '/start/,/end/p' /etc/hosts",
        "sed '1~2d;$!N' /etc/hosts",
        "sed 's/e/w/g' /etc/hosts",
        "sed -n '/Error/Ip' /var/log/syslog",
        "sed 'y/abc/xyz/' /etc/hosts",
    ] {
        assert_eq!(intent(cmd), CommandIntent::ReadOnlyCertain, "{cmd}");
    }
}

#[test]
fn test_curl_output_flags_in_every_spelling_are_refused() {
    for cmd in [
        "curl -o/tmp/x http://example.com",
        "curl -ofile http://example.com",
        "curl --output=/tmp/x http://example.com",
        "curl --output /tmp/x http://example.com",
        "curl -D/tmp/h http://example.com",
        "curl --dump-header=/tmp/h http://example.com",
        "curl -sD /tmp/h http://example.com",
        "curl -XPOST http://example.com",
        "curl -sXDELETE http://example.com",
        "curl --request=PUT http://example.com",
        "curl --data=a http://example.com",
    ] {
        let c = classify(cmd);
        assert_eq!(c.intent, CommandIntent::WriteOrUnknown, "{cmd}");
        assert_eq!(c.category, Some(BlockCategory::WriteVerb), "{cmd}");
    }
    for cmd in [
        "curl -o- http://example.com",
        "curl -so - http://example.com",
        "curl --output=- http://example.com",
        "curl -sD - http://example.com",
        "curl -sSL -H 'Accept: text/plain' http://example.com",
        "curl -XGET http://example.com",
    ] {
        assert_eq!(intent(cmd), CommandIntent::ReadOnlyCertain, "{cmd}");
    }
}

#[test]
fn test_redirects_and_lexer_refusals() {
    let c = classify("echo hi > /tmp/x");
    assert_eq!(c.intent, CommandIntent::WriteOrUnknown);
    assert_eq!(c.category, Some(BlockCategory::Redirect));

    assert_eq!(
        classify("ls >> /tmp/x").category,
        Some(BlockCategory::Redirect)
    );
    assert_eq!(
        classify("echo $(id)").category,
        Some(BlockCategory::Substitution)
    );
    assert_eq!(
        classify("echo `id`").category,
        Some(BlockCategory::Substitution)
    );
    assert_eq!(classify("sleep 1 &").intent, CommandIntent::WriteOrUnknown);
    assert_eq!(classify("ls |").intent, CommandIntent::WriteOrUnknown);
    assert_eq!(classify("   ").intent, CommandIntent::WriteOrUnknown);
}

#[test]
fn test_any_write_stage_poisons_the_pipeline() {
    let c = classify("ls /tmp; rm -f /tmp/x");
    assert_eq!(c.intent, CommandIntent::WriteOrUnknown);
    assert_eq!(c.category, Some(BlockCategory::WriteVerb));

    assert_eq!(
        intent("cat /etc/hosts | tee /tmp/hosts"),
        CommandIntent::WriteOrUnknown
    );
}

#[test]
fn test_journalctl_is_bounded() {
    let c = classify("journalctl -u nginx");
    assert_eq!(c.intent, CommandIntent::ReadOnlyConditional);
    assert!(c.auto_recoverable);
    assert_eq!(rewrite("journalctl -u nginx"), "journalctl -u nginx -n 1000 --no-pager");
    assert_eq!(
        rewrite("journalctl -u nginx --no-pager"),
        "journalctl -u nginx --no-pager -n 1000"
    );
    assert_eq!(
        rewrite("journalctl -u nginx | grep error"),
        "journalctl -u nginx -n 1000 --no-pager | grep error"
    );
    assert_eq!(
        rewrite("journalctl -u x 2>/dev/null"),
        "journalctl -u x -n 1000 --no-pager 2>/dev/null"
    );
    assert_eq!(
        intent("journalctl --vacuum-time=1d"),
        CommandIntent::WriteOrUnknown
    );
}

#[test]
fn test_unbounded_streams_get_bounded_rewrites() {
    let c = classify("tail -f /var/log/syslog");
    assert_eq!(c.intent, CommandIntent::WriteOrUnknown);
    assert_eq!(c.category, Some(BlockCategory::UnboundedStream));
    assert!(c.auto_recoverable);

    let cases = [
        ("tail -f /var/log/syslog", "tail -n 100 /var/log/syslog"),
        ("tail -n 20 -f /var/log/syslog", "tail -n 20 /var/log/syslog"),
        ("tail -f a | grep x", "tail -n 100 a | grep x"),
        ("docker logs -f web", "docker logs --tail 100 web"),
        (
            "kubectl logs -f nginx-abc -n default",
            "kubectl logs --tail=100 nginx-abc -n default",
        ),
        ("watch df -h", "df -h"),
        ("watch -n 5 'df -h'", "df -h"),
        ("ping 8.8.8.8", "ping -c 4 8.8.8.8"),
        ("vmstat 1", "vmstat 1 5"),
        ("docker stats", "docker stats --no-stream"),
        ("wget http://x/file", "wget -qO- http://x/file"),
    ];
    for (cmd, expected) in cases {
        assert_eq!(rewrite(cmd), expected, "{cmd}");
    }
    assert_eq!(
        classify("yes").category,
        Some(BlockCategory::UnboundedStream)
    );
}

#[test]
fn test_interactive_commands_get_batch_rewrites() {
    let c = classify("top");
    assert_eq!(c.intent, CommandIntent::ReadOnlyConditional);
    assert_eq!(c.suggested_rewrite.as_deref(), Some("top -b -n 1"));

    let c = classify("htop");
    assert_eq!(c.category, Some(BlockCategory::InteractiveRepl));
    assert_eq!(c.suggested_rewrite.as_deref(), Some("top -b -n 1"));

    let c = classify("less /var/log/syslog");
    assert_eq!(c.category, Some(BlockCategory::Pager));
    assert_eq!(c.suggested_rewrite.as_deref(), Some("cat /var/log/syslog"));

    let c = classify("man ls");
    assert_eq!(c.category, Some(BlockCategory::Pager));
    assert!(c.suggested_rewrite.is_none());
}

#[test]
fn test_tty_flags_are_stripped() {
    let c = classify("docker exec -it web ls /app");
    assert_eq!(c.category, Some(BlockCategory::TtyFlag));
    assert_eq!(c.suggested_rewrite.as_deref(), Some("docker exec web ls /app"));

    assert_eq!(
        rewrite("docker exec -it web grep 'a b' /f"),
        "docker exec web grep 'a b' /f"
    );
    assert_eq!(
        rewrite("kubectl exec -it nginx-abc -- ls"),
        "kubectl exec nginx-abc -- ls"
    );

    let c = classify("docker exec -it web bash");
    assert_eq!(c.intent, CommandIntent::WriteOrUnknown);
    assert_eq!(c.category, Some(BlockCategory::InteractiveRepl));
    assert!(c.reason.contains("inside container"));
    assert!(c.suggested_rewrite.is_none());
}

#[test]
fn test_inner_commands_are_classified() {
    assert_eq!(
        intent("docker exec web rm -rf /data"),
        CommandIntent::WriteOrUnknown
    );
    assert_eq!(
        intent("kubectl exec pod -- touch /x"),
        CommandIntent::WriteOrUnknown
    );
    assert_eq!(intent("pct exec 141 -- df -h"), CommandIntent::ReadOnlyCertain);
    assert_eq!(intent("xargs rm"), CommandIntent::WriteOrUnknown);
    assert_eq!(intent("timeout 5 reboot"), CommandIntent::WriteOrUnknown);
    assert_eq!(
        rewrite("docker exec web journalctl -u app"),
        "docker exec web journalctl -u app -n 1000 --no-pager"
    );
}

#[test]
fn test_sql_clients_accept_inline_reads_only() {
    for cmd in [
        "mysql -e 'SELECT * FROM users LIMIT 5'",
        "psql -c 'SELECT count(*) FROM jobs'",
        "psql -c '\\dt'",
        "sqlite3 /data/app.db .tables",
        "sqlite3 /data/app.db 'SELECT 1'",
        "redis-cli -h localhost INFO",
    ] {
        let c = classify(cmd);
        assert_eq!(c.intent, CommandIntent::ReadOnlyConditional, "{cmd}");
        assert!(c.suggested_rewrite.is_none(), "{cmd}");
    }
    assert_eq!(
        intent("mysql -e 'SELECT * INTO OUTFILE \"/tmp/x\" FROM t'"),
        CommandIntent::WriteOrUnknown
    );
    assert_eq!(
        intent("psql -c 'SELECT 1; DELETE FROM t'"),
        CommandIntent::WriteOrUnknown
    );
}

#[test]
fn test_mixed_refusals_have_no_partial_rewrite() {
    let c = classify("tail -f a; rm b");
    assert_eq!(c.intent, CommandIntent::WriteOrUnknown);
    assert_eq!(c.category, Some(BlockCategory::UnboundedStream));
    assert!(c.suggested_rewrite.is_none());
    assert!(!c.auto_recoverable);
}

#[test]
fn test_rewrites_classify_as_certain() {
    for cmd in [
        "journalctl -u nginx",
        "journalctl -f",
        "tail -f /var/log/syslog",
        "docker logs -f web",
        "kubectl logs -f nginx-abc -n default",
        "docker exec -it web ls /app",
        "watch df -h",
        "less /var/log/syslog",
        "top",
        "ping 8.8.8.8",
        "vmstat 1",
        "docker stats",
        "dmesg -w",
    ] {
        let rewritten = rewrite(cmd);
        assert_eq!(
            intent(&rewritten),
            CommandIntent::ReadOnlyCertain,
            "{cmd} -> {rewritten}"
        );
    }
}

#[test]
fn test_category_wire_names() {
    assert_eq!(BlockCategory::TtyFlag.as_str(), "tty_flag");
    assert_eq!(BlockCategory::UnboundedStream.to_string(), "unbounded_stream");
    assert_eq!(
        serde_json::to_value(CommandIntent::ReadOnlyConditional).unwrap(),
        serde_json::json!("read_only_conditional")
    );
}
