use crate::helpers::execute;
use insta::assert_display_snapshot;

#[test]
fn a_closure_keeps_its_own_copy_of_a_captured_variable() {
    let source = r#"fun makeCounter() {
  var count = 0;
  fun counter() {
    count = count + 1;
    print count;
  }
  return counter;
}

var first = makeCounter();
var second = makeCounter();
first();
first();
second();"#;
    let output = execute(source);
    assert_display_snapshot!(output, @r###"
    1
    2
    1
    "###);
}

#[test]
fn a_bound_method_keeps_its_receiver_even_after_reassignment() {
    let source = r#"class Greeter {
  init(name) {
    this.name = name;
  }
  greet() {
    print "hi " + this.name;
  }
}

var a = Greeter("a");
var greet = a.greet;
a = nil;
greet();"#;
    let output = execute(source);
    assert_display_snapshot!(output, @r###"
    hi a
    "###);
}
