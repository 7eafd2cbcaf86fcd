use crate::helpers::execute;
use insta::assert_display_snapshot;

#[test]
fn fields_and_methods() {
    let source = r#"class Cake {
  init(flavor) {
    this.flavor = flavor;
  }

  describe() {
    print "a " + this.flavor + " cake";
  }
}

var cake = Cake("chocolate");
cake.describe();"#;
    let output = execute(source);
    assert_display_snapshot!(output, @r###"
    a chocolate cake
    "###);
}

#[test]
fn fields_shadow_methods() {
    let source = r#"class Box {
  value() { return "method"; }
}

var box = Box();
box.value = "field";
print box.value;"#;
    let output = execute(source);
    assert_display_snapshot!(output, @r###"
    field
    "###);
}

#[test]
fn inheritance_and_super_calls() {
    let source = r#"class Pastry {
  cook() {
    print "pastry cooking";
  }
}

class Croissant < Pastry {
  cook() {
    super.cook();
    print "croissant cooking";
  }
}

Croissant().cook();"#;
    let output = execute(source);
    assert_display_snapshot!(output, @r###"
    pastry cooking
    croissant cooking
    "###);
}

#[test]
fn init_always_returns_this_even_with_an_early_return() {
    let source = r#"class Thing {
  init() {
    this.ready = true;
    return;
  }
}

var t = Thing();
print t.ready;"#;
    let output = execute(source);
    assert_display_snapshot!(output, @r###"
    true
    "###);
}
